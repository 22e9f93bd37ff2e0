//! `crank pycheck` command
//!
//! The exit code is the number of checks that failed.

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::PycheckArgs;
use crank::ops;

impl CommandArgs for PycheckArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        ops::pycheck(
            &session.ctx,
            &session.shell,
            self.incremental,
            self.dry_run.dry_run,
        )
    }
}
