//! `crank save` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::SaveArgs;
use crank::util::shell::Status;

impl CommandArgs for SaveArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let path = match self.file {
            Some(file) => file,
            None => session.ctx.config_path().to_path_buf(),
        };
        session.ctx.save_to(&path)?;
        session.shell.status(Status::Saved, path.display());
        Ok(0)
    }
}
