//! `crank check` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::CheckArgs;
use crank::ops;

impl CommandArgs for CheckArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        ops::check(&ctx, &session.shell, self.iterate, self.dry_run.dry_run)
    }
}
