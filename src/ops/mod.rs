//! High-level operations.
//!
//! This module contains the implementation of crank commands. Operations
//! return the exit code to report; failures the user can fix are returned as
//! [`Diagnostic`] errors.

pub mod cmake;
pub mod demo;
pub mod python;

use std::path::Path;

use anyhow::Result;

use crate::exec::{self, RunOptions};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::{path_kind, PathKind};
use crate::util::process::ProcessBuilder;
use crate::util::shell::{Shell, Status};

pub use cmake::{build, check, clean, gen, GenOptions};
pub use demo::{list_demos, run_demo, RunDemoOptions};
pub use python::{pycheck, pysetup, PYCHECK_TOOLS};

/// Launch `cmd` with its output streamed to the console and return its exit code.
///
/// With `dry_run` the command is only reported.
pub fn run_streamed(
    shell: &Shell,
    cmd: &ProcessBuilder,
    opts: &RunOptions,
    dry_run: bool,
) -> Result<i32> {
    let location = cmd
        .get_cwd()
        .map(|dir| format!(" in {}", dir.display()))
        .unwrap_or_default();

    if dry_run {
        shell.status(
            Status::DryRun,
            format!("`{}`{}", cmd.display_command(), location),
        );
        return Ok(0);
    }

    if shell.is_verbose() {
        shell.status(
            Status::Running,
            format!("`{}`{}", cmd.display_command(), location),
        );
    } else {
        shell.status(Status::Running, program_name(cmd.get_program()));
    }

    let sink = shell.sink();
    let result = exec::run(cmd, &sink, opts)?;

    if result.timed_out {
        shell.warn(format!(
            "`{}` was stopped after its time limit",
            program_name(cmd.get_program())
        ));
    }
    shell.json_event(&serde_json::json!({
        "reason": "process-exit",
        "program": cmd.get_program().display().to_string(),
        "exit_code": result.exit_code,
        "timed_out": result.timed_out,
    }));
    tracing::debug!(
        "`{}` exited with {} ({} stdout lines, {} stderr lines)",
        cmd.display_command(),
        result.exit_code,
        result.stdout.lines,
        result.stderr.lines
    );

    Ok(result.exit_code)
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Require an existing build directory.
pub fn verify_build_dir(dir: &Path) -> Result<(), Diagnostic> {
    match path_kind(dir) {
        PathKind::Directory => Ok(()),
        PathKind::Other => Err(Diagnostic::error(format!(
            "Build directory {} exists as something other than a directory",
            dir.display()
        ))),
        PathKind::Missing => Err(Diagnostic::error(format!(
            "Build directory {} does not exist",
            dir.display()
        ))
        .with_suggestion(suggestions::RUN_GEN)),
    }
}

/// Require an existing virtual environment.
pub fn verify_venv_dir(dir: &Path) -> Result<(), Diagnostic> {
    match path_kind(dir) {
        PathKind::Directory => Ok(()),
        PathKind::Other => Err(Diagnostic::error(format!(
            "Virtual environment {} exists as something other than a directory",
            dir.display()
        ))),
        PathKind::Missing => Err(Diagnostic::error(format!(
            "Virtual environment {} does not exist",
            dir.display()
        ))
        .with_suggestion(suggestions::RUN_PYSETUP)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::shell::{ColorChoice, ShellMode, Verbosity};
    use tempfile::TempDir;

    fn quiet_shell() -> Shell {
        Shell::new(ShellMode::Human {
            verbosity: Verbosity::Quiet,
            color: ColorChoice::Never,
        })
    }

    #[test]
    fn test_verify_build_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(verify_build_dir(tmp.path()).is_ok());

        let missing = verify_build_dir(&tmp.path().join("build")).unwrap_err();
        assert!(missing.message.ends_with("does not exist"));
        assert_eq!(missing.suggestions, vec![suggestions::RUN_GEN.to_string()]);

        let file = tmp.path().join("file");
        std::fs::write(&file, "").unwrap();
        let not_dir = verify_build_dir(&file).unwrap_err();
        assert!(not_dir.message.contains("something other than a directory"));
    }

    #[test]
    fn test_verify_venv_dir() {
        let tmp = TempDir::new().unwrap();
        let err = verify_venv_dir(&tmp.path().join("venv")).unwrap_err();
        assert!(err.message.starts_with("Virtual environment"));
        assert_eq!(err.suggestions, vec![suggestions::RUN_PYSETUP.to_string()]);
    }

    #[test]
    fn test_dry_run_launches_nothing() {
        let cmd = ProcessBuilder::new("/no/such/program").arg("--help");
        let code = run_streamed(&quiet_shell(), &cmd, &RunOptions::default(), true).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_launch_failure_is_error() {
        let cmd = ProcessBuilder::new("/no/such/program");
        let err = run_streamed(&quiet_shell(), &cmd, &RunOptions::default(), false).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_returned() {
        let cmd = ProcessBuilder::new("/bin/sh").args(["-c", "exit 4"]);
        let code = run_streamed(&quiet_shell(), &cmd, &RunOptions::default(), false).unwrap();
        assert_eq!(code, 4);
    }

    #[test]
    fn test_program_name() {
        assert_eq!(program_name(Path::new("/usr/bin/cmake")), "cmake");
        assert_eq!(program_name(Path::new("cmake")), "cmake");
    }
}
