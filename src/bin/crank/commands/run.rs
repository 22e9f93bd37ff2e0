//! `crank run` command

use std::time::Duration;

use anyhow::{bail, Result};

use super::{CommandArgs, Session};
use crate::cli::RunArgs;
use crank::ops::{self, RunDemoOptions};

impl CommandArgs for RunArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let timeout = self.timeout.map(parse_timeout).transpose()?;

        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        let opts = RunDemoOptions {
            demo: self.demo,
            tick_limit: self.tick_limit,
            timeout,
            dry_run: self.dry_run.dry_run,
        };
        ops::run_demo(&ctx, &session.shell, &opts)
    }
}

/// Seconds from `--timeout` as a duration.
fn parse_timeout(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("--timeout must be a positive number of seconds, got {}", secs);
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) => Ok(timeout),
        Err(_) => bail!("--timeout of {} seconds is too large", secs),
    }
}
