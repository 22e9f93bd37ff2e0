//! Python helper tooling: virtual environment setup and source checks.
//!
//! Helper scripts live in `<home>/py` and run from a virtual environment in
//! `<home>/venv` whose interpreter is registered as `localpython3`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::context::ProjectContext;
use crate::exec::RunOptions;
use crate::ops::{run_streamed, verify_venv_dir};
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::{path_kind, remove_dir_all_if_exists, PathKind};
use crate::util::platform::executable_name;
use crate::util::process::ProcessBuilder;
use crate::util::shell::{Shell, Status};

/// System interpreter used to create the virtual environment.
pub const PYTHON_ALIAS: &str = "python3";

/// Interpreter inside the virtual environment.
pub const LOCAL_PYTHON_ALIAS: &str = "localpython3";

/// Packages installed when the project has no `requirements.txt`.
pub const DEV_PACKAGES: [&str; 6] = [
    "mypy",
    "pylint",
    "pydocstyle",
    "pycodestyle",
    "bandit",
    "colorama",
];

/// Checks run by [`pycheck`], each as `python -m <tool> <args...>`.
pub const PYCHECK_TOOLS: [&[&str]; 4] = [
    &["mypy"],
    &["pylint"],
    &[
        "pycodestyle",
        "--max-line-length=120",
        "--show-source",
        "--statistics",
        "--count",
    ],
    &["pydocstyle", "--ignore=D200,D203,D204,D212,D401"],
];

/// Packages checked by [`pycheck`], relative to the Python directory.
const PY_SOURCES: [&str; 1] = ["knell"];

/// Interpreter path inside a virtual environment.
pub fn venv_python(venv: &Path) -> PathBuf {
    let bin = if cfg!(windows) { "Scripts" } else { "bin" };
    venv.join(bin).join(executable_name("python"))
}

/// Create the virtual environment and install the helper packages.
///
/// Registers `localpython3` when the environment is created.
pub fn pysetup(
    ctx: &mut ProjectContext,
    shell: &Shell,
    clean: bool,
    dry_run: bool,
) -> Result<i32> {
    let python = ctx.programs().verify_executable(PYTHON_ALIAS)?;
    let venv = ctx.venv_dir();
    let home = ctx.home().to_path_buf();

    match path_kind(&venv) {
        PathKind::Other => {
            return Err(Diagnostic::error(format!(
                "Cannot create venv, {} is a file",
                venv.display()
            ))
            .into());
        }
        PathKind::Directory if clean => {
            if dry_run {
                shell.status(Status::DryRun, format!("remove {}", venv.display()));
            } else {
                remove_dir_all_if_exists(&venv)?;
                shell.status(Status::Removed, venv.display());
            }
        }
        _ => {}
    }

    let local_python = venv_python(&venv);
    if !venv.is_dir() || (clean && dry_run) {
        let cmd = ProcessBuilder::new(&python)
            .args(["-m", "venv"])
            .arg(&venv)
            .cwd(&home);
        let code = run_streamed(shell, &cmd, &RunOptions::default(), dry_run)?;
        if code != 0 {
            shell.error(format!(
                "Could not create virtual environment at {}",
                venv.display()
            ));
            return Ok(code);
        }

        if !dry_run {
            ctx.programs_mut()
                .register(LOCAL_PYTHON_ALIAS, &local_python, true)?;
            shell.status(
                Status::Registered,
                format!("{} -> {}", LOCAL_PYTHON_ALIAS, local_python.display()),
            );
        }
    }

    let local_python = ctx
        .programs()
        .get(LOCAL_PYTHON_ALIAS)
        .map(Path::to_path_buf)
        .unwrap_or(local_python);

    let upgrade = ProcessBuilder::new(&local_python)
        .args(["-m", "pip", "install", "--upgrade", "pip"])
        .cwd(&home);
    if run_streamed(shell, &upgrade, &RunOptions::default(), dry_run)? != 0 {
        shell.warn("Could not upgrade pip");
    }

    let requirements = ctx.py_dir().join("requirements.txt");
    let mut install = ProcessBuilder::new(&local_python)
        .args(["-m", "pip", "install"])
        .cwd(&home);
    if requirements.is_file() {
        install = install.arg("-r").arg(&requirements);
    } else {
        install = install.args(DEV_PACKAGES);
    }

    run_streamed(shell, &install, &RunOptions::default(), dry_run)
}

/// Run every Python check and return the number that failed.
///
/// With `incremental` it stops at the first failure.
pub fn pycheck(ctx: &ProjectContext, shell: &Shell, incremental: bool, dry_run: bool) -> Result<i32> {
    let python = ctx.programs().verify_executable(LOCAL_PYTHON_ALIAS)?;
    verify_venv_dir(&ctx.venv_dir())?;

    let py_dir = ctx.py_dir();
    let mut failures = 0;
    for tool in PYCHECK_TOOLS {
        let cmd = ProcessBuilder::new(&python)
            .arg("-m")
            .args(tool)
            .args(PY_SOURCES)
            .cwd(&py_dir);

        if run_streamed(shell, &cmd, &RunOptions::default(), dry_run)? != 0 {
            failures += 1;
            shell.warn(format!("{} reported problems", tool[0]));
            if incremental {
                break;
            }
        }
    }

    if failures == 0 {
        shell.status(Status::Finished, "all Python checks passed");
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::shell::{ColorChoice, ShellMode, Verbosity};
    use tempfile::TempDir;

    fn shell() -> Shell {
        Shell::new(ShellMode::Human {
            verbosity: Verbosity::Quiet,
            color: ColorChoice::Never,
        })
    }

    fn context(tmp: &TempDir) -> ProjectContext {
        ProjectContext::with_global(tmp.path(), None, None).unwrap()
    }

    #[test]
    fn test_venv_python() {
        let python = venv_python(Path::new("/work/venv"));
        if cfg!(windows) {
            assert_eq!(python, Path::new("/work/venv/Scripts/python.exe"));
        } else {
            assert_eq!(python, Path::new("/work/venv/bin/python"));
        }
    }

    #[test]
    fn test_pysetup_requires_python3() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        let err = pysetup(&mut ctx, &shell(), false, false).unwrap_err();
        let diag = err.downcast_ref::<Diagnostic>().unwrap();
        assert_eq!(diag.message, "No alias exists for python3");
    }

    #[test]
    fn test_pycheck_requires_venv() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        let python = tmp.path().join("python");
        std::fs::write(&python, "").unwrap();
        ctx.programs_mut()
            .register(LOCAL_PYTHON_ALIAS, &python, false)
            .unwrap();

        let err = pycheck(&ctx, &shell(), false, false).unwrap_err();
        let diag = err.downcast_ref::<Diagnostic>().unwrap();
        assert!(diag.message.starts_with("Virtual environment"));
    }

    #[cfg(unix)]
    mod fake_python {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// A python stand-in that logs its arguments, "creates" a venv by
        /// copying itself, and fails `pylint`.
        fn install(tmp: &TempDir) -> (PathBuf, PathBuf) {
            let log = tmp.path().join("python.log");
            let script = tmp.path().join("fake-python3");
            std::fs::write(
                &script,
                format!(
                    "#!/bin/sh\n\
                     echo \"$*\" >> '{log}'\n\
                     if [ \"$2\" = venv ]; then mkdir -p \"$3/bin\" && cp \"$0\" \"$3/bin/python\"; fi\n\
                     if [ \"$2\" = pylint ]; then exit 1; fi\n\
                     exit 0\n",
                    log = log.display()
                ),
            )
            .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            (script, log)
        }

        fn setup(tmp: &TempDir) -> (ProjectContext, PathBuf) {
            let (script, log) = install(tmp);
            let mut ctx = context(tmp);
            ctx.programs_mut()
                .register(PYTHON_ALIAS, &script, false)
                .unwrap();
            (ctx, log)
        }

        #[test]
        fn test_pysetup_creates_venv_and_installs() {
            let tmp = TempDir::new().unwrap();
            let (mut ctx, log) = setup(&tmp);

            assert_eq!(pysetup(&mut ctx, &shell(), false, false).unwrap(), 0);
            assert_eq!(
                ctx.programs().get(LOCAL_PYTHON_ALIAS),
                Some(venv_python(&ctx.venv_dir()).as_path())
            );

            let logged = std::fs::read_to_string(&log).unwrap();
            let lines: Vec<_> = logged.lines().collect();
            assert_eq!(lines.len(), 3);
            assert_eq!(lines[0], format!("-m venv {}", ctx.venv_dir().display()));
            assert_eq!(lines[1], "-m pip install --upgrade pip");
            assert_eq!(
                lines[2],
                "-m pip install mypy pylint pydocstyle pycodestyle bandit colorama"
            );
        }

        #[test]
        fn test_pysetup_uses_requirements_file() {
            let tmp = TempDir::new().unwrap();
            let (mut ctx, log) = setup(&tmp);
            std::fs::create_dir_all(ctx.py_dir()).unwrap();
            let requirements = ctx.py_dir().join("requirements.txt");
            std::fs::write(&requirements, "mypy\n").unwrap();

            assert_eq!(pysetup(&mut ctx, &shell(), false, false).unwrap(), 0);
            let logged = std::fs::read_to_string(&log).unwrap();
            assert!(logged
                .lines()
                .any(|l| l == format!("-m pip install -r {}", requirements.display())));
        }

        #[test]
        fn test_pysetup_rejects_file_venv() {
            let tmp = TempDir::new().unwrap();
            let (mut ctx, _log) = setup(&tmp);
            std::fs::write(ctx.venv_dir(), "").unwrap();

            let err = pysetup(&mut ctx, &shell(), false, false).unwrap_err();
            assert!(err.to_string().contains("is a file"));
        }

        #[test]
        fn test_pycheck_counts_failures() {
            let tmp = TempDir::new().unwrap();
            let (mut ctx, log) = setup(&tmp);
            std::fs::create_dir_all(ctx.py_dir()).unwrap();
            pysetup(&mut ctx, &shell(), false, false).unwrap();
            std::fs::remove_file(&log).unwrap();

            assert_eq!(pycheck(&ctx, &shell(), false, false).unwrap(), 1);
            let logged = std::fs::read_to_string(&log).unwrap();
            let lines: Vec<_> = logged.lines().collect();
            assert_eq!(lines.len(), 4);
            assert_eq!(lines[0], "-m mypy knell");
            assert_eq!(
                lines[3],
                "-m pydocstyle --ignore=D200,D203,D204,D212,D401 knell"
            );
        }

        #[test]
        fn test_pycheck_incremental_stops_early() {
            let tmp = TempDir::new().unwrap();
            let (mut ctx, log) = setup(&tmp);
            std::fs::create_dir_all(ctx.py_dir()).unwrap();
            pysetup(&mut ctx, &shell(), false, false).unwrap();
            std::fs::remove_file(&log).unwrap();

            assert_eq!(pycheck(&ctx, &shell(), true, false).unwrap(), 1);
            let logged = std::fs::read_to_string(&log).unwrap();
            assert_eq!(logged.lines().count(), 2);
        }
    }
}
