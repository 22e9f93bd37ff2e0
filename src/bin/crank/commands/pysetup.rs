//! `crank pysetup` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::PysetupArgs;
use crank::ops;

impl CommandArgs for PysetupArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let dry_run = self.dry_run.dry_run;
        let code = ops::pysetup(&mut session.ctx, &session.shell, self.clean, dry_run)?;
        if !dry_run {
            session.autosave()?;
        }
        Ok(code)
    }
}
