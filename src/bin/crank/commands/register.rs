//! `crank register` command

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use super::{CommandArgs, Session};
use crate::cli::RegisterArgs;
use crank::core::registry::discover;
use crank::util::diagnostic::{suggestions, Diagnostic};
use crank::util::shell::Status;

impl CommandArgs for RegisterArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        let path = match (self.find, self.path) {
            (true, _) => match discover(&self.alias) {
                Some(path) => path,
                None => {
                    return Err(Diagnostic::error(format!(
                        "Could not find {} on PATH",
                        self.alias
                    ))
                    .with_suggestion(suggestions::REGISTER_PROGRAM)
                    .into());
                }
            },
            (false, Some(path)) => absolute(path)?,
            (false, None) => bail!("a path is required unless --find is given"),
        };

        if !path.is_file() && !self.force {
            return Err(
                Diagnostic::error(format!("No program exists at {}", path.display()))
                    .with_suggestion("Use --force to register it anyway")
                    .into(),
            );
        }

        let shown = format!("{} -> {}", self.alias, path.display());
        if self.dry_run.dry_run {
            let mut preview = session.ctx.programs().clone();
            preview.register(&self.alias, &path, self.override_existing)?;
            session
                .shell
                .status(Status::DryRun, format!("register {}", shown));
            return Ok(0);
        }

        session
            .ctx
            .programs_mut()
            .register(&self.alias, &path, self.override_existing)?;
        session.shell.status(Status::Registered, shown);
        session.autosave()?;
        Ok(0)
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    Ok(cwd.join(path))
}
