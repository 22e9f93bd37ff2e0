//! `crank clean` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::CleanArgs;
use crank::ops;

impl CommandArgs for CleanArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        ops::clean(&ctx, &session.shell, self.dry_run.dry_run)
    }
}
