//! `crank default` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::DefaultArgs;
use crank::core::DefaultKey;
use crank::util::shell::Status;

impl CommandArgs for DefaultArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let key: DefaultKey = self.name.parse().map_err(anyhow::Error::msg)?;
        session.ctx.set_default(key, &self.value)?;
        session
            .shell
            .status(Status::Saved, format!("{} = {}", self.name, self.value));
        session.autosave()?;
        Ok(0)
    }
}
