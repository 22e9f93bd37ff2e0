//! `crank demo` command

use anyhow::Result;

use super::{CommandArgs, Session};
use crate::cli::DemoArgs;
use crank::ops;

impl CommandArgs for DemoArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        ops::list_demos(&ctx, &session.shell)
    }
}
