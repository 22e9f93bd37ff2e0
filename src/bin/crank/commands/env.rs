//! `crank env` command
//!
//! Prints the effective configuration as pretty JSON.

use anyhow::{Context, Result};

use super::{CommandArgs, Session};
use crate::cli::EnvArgs;

impl CommandArgs for EnvArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let ctx = session.ctx.with_overrides(&self.overrides.to_overrides());
        let dump = ctx.dump();

        if session.shell.is_json() {
            session.shell.json_event(&serde_json::json!({
                "reason": "env",
                "env": dump,
            }));
        } else {
            let text = serde_json::to_string_pretty(&dump)
                .context("failed to format configuration")?;
            println!("{}", text);
        }
        Ok(0)
    }
}
