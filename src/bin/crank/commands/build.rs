//! `crank build` command

use std::time::Instant;

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::BuildArgs;
use crank::ops;
use crank::util::shell::{format_duration, Status};

impl CommandArgs for BuildArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        let start = Instant::now();

        let code = ops::build(&ctx, &session.shell, self.dry_run.dry_run)?;

        if code == 0 && !self.dry_run.dry_run {
            session.shell.status(
                Status::Finished,
                format!(
                    "{} build in {}",
                    ctx.build_config(),
                    format_duration(start.elapsed())
                ),
            );
        }
        Ok(code)
    }
}
