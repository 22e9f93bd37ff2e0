//! Listing and running demos.
//!
//! Demos are shared libraries built into `<build dir>/demos`. The driver
//! executable loads one of them with `--game <library>`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::core::context::ProjectContext;
use crate::exec::RunOptions;
use crate::ops::{cmake, run_streamed};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::{list_files, path_kind, PathKind};
use crate::util::platform::{shared_lib_name, shared_lib_root};
use crate::util::process::ProcessBuilder;
use crate::util::shell::Shell;

/// Options for [`run_demo`].
#[derive(Debug, Clone, Default)]
pub struct RunDemoOptions {
    /// Demo to run; the configured default when `None`.
    pub demo: Option<String>,
    /// Stop the driver after this many ticks.
    pub tick_limit: Option<u64>,
    /// Kill the driver after this long.
    pub timeout: Option<Duration>,
    pub dry_run: bool,
}

/// Names of the demos built into `dir`, sorted.
pub fn find_demos(dir: &Path) -> Result<Vec<String>> {
    Ok(list_files(dir)?
        .iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            shared_lib_root(file_name).map(str::to_string)
        })
        .collect())
}

/// Print the demos available to `run`.
pub fn list_demos(ctx: &ProjectContext, shell: &Shell) -> Result<i32> {
    let demo_dir = ctx.demo_dir();
    if path_kind(&demo_dir) != PathKind::Directory {
        return Err(Diagnostic::error(format!(
            "Demo directory {} does not exist",
            demo_dir.display()
        ))
        .with_suggestion(suggestions::RUN_BUILD)
        .into());
    }

    let demos = find_demos(&demo_dir)?;
    if demos.is_empty() {
        shell.note(format!("no demos in {}", demo_dir.display()));
    }

    for name in &demos {
        let is_default = ctx.demo() == Some(name.as_str());
        if is_default {
            shell.print(format!("{} (default)", name));
        } else {
            shell.print(name);
        }
        shell.json_event(&serde_json::json!({
            "reason": "demo",
            "name": name,
            "path": demo_dir.join(shared_lib_name(name)).display().to_string(),
            "default": is_default,
        }));
    }

    Ok(0)
}

/// Build, then launch the driver with a demo.
pub fn run_demo(ctx: &ProjectContext, shell: &Shell, opts: &RunDemoOptions) -> Result<i32> {
    let Some(demo) = opts.demo.as_deref().or_else(|| ctx.demo()) else {
        return Err(Diagnostic::error("No demo given")
            .with_suggestion(suggestions::SET_DEMO)
            .into());
    };

    let built = cmake::build(ctx, shell, opts.dry_run)?;
    if built != 0 {
        shell.error(format!("build failed with exit code {}, not running {}", built, demo));
        return Ok(built);
    }

    let game = ctx.demo_dir().join(shared_lib_name(demo));
    if !opts.dry_run && !game.is_file() {
        return Err(Diagnostic::error(format!(
            "Demo {} was not found at {}",
            demo,
            game.display()
        ))
        .with_suggestion(suggestions::LIST_DEMOS)
        .into());
    }

    let cmd = driver_command(&ctx.driver_path(), &game, opts.tick_limit).cwd(ctx.home());
    let run_opts = RunOptions {
        timeout: opts.timeout,
    };

    run_streamed(shell, &cmd, &run_opts, opts.dry_run)
}

/// Command line for the driver running `game`.
pub fn driver_command(driver: &Path, game: &Path, tick_limit: Option<u64>) -> ProcessBuilder {
    let mut cmd = ProcessBuilder::new(driver).arg("--game").arg(game);
    if let Some(ticks) = tick_limit {
        cmd = cmd.arg("--tick-limit").arg(ticks.to_string());
    }
    cmd
}
