//! `crank gen` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::GenArgs;
use crank::ops::{self, GenOptions};

impl CommandArgs for GenArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        let opts = GenOptions {
            force: self.force,
            enable_ccache: self.enable_ccache,
            dry_run: self.dry_run.dry_run,
        };
        ops::gen(&ctx, &session.shell, &opts)
    }
}
