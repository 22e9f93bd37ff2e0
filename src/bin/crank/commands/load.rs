//! `crank load` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::LoadArgs;
use crank::util::shell::Status;

impl CommandArgs for LoadArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        session.ctx.load_from(&self.file)?;
        session.shell.status(
            Status::Loading,
            format!("configuration from {}", self.file.display()),
        );
        Ok(0)
    }
}
