//! Subprocess launching.
//!
//! [`ProcessBuilder`] describes one invocation (program, arguments, working
//! directory, environment). [`ProcessBuilder::start`] validates it and spawns
//! the child with piped stdout/stderr and a null stdin, returning a
//! [`ProcessHandle`] the orchestrator owns until the child has been waited on.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use miette::Diagnostic;
use thiserror::Error;

/// Reasons a process could not be started.
///
/// Every variant is produced before (or instead of) a child process existing,
/// so no output has been streamed when one of these is returned.
#[derive(Debug, Error, Diagnostic)]
pub enum LaunchError {
    #[error("no program given to launch")]
    #[diagnostic(code(crank::launch::empty))]
    EmptyCommand,

    #[error("executable `{}` not found", .program.display())]
    #[diagnostic(
        code(crank::launch::not_found),
        help("register the program with `crank register ALIAS PATH`")
    )]
    NotFound { program: PathBuf },

    #[error("`{}` is not an executable file", .program.display())]
    #[diagnostic(code(crank::launch::not_executable))]
    NotExecutable { program: PathBuf },

    #[error("permission denied launching `{}`", .program.display())]
    #[diagnostic(code(crank::launch::permission_denied))]
    PermissionDenied { program: PathBuf },

    #[error("working directory {} does not exist", .dir.display())]
    #[diagnostic(code(crank::launch::missing_dir))]
    MissingWorkingDir { dir: PathBuf },

    #[error("working directory {} exists as something other than a directory", .dir.display())]
    #[diagnostic(code(crank::launch::not_a_dir))]
    NotADirectory { dir: PathBuf },

    #[error("failed to spawn `{}`", .program.display())]
    #[diagnostic(code(crank::launch::spawn))]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    env_remove: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            env_remove: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Remove an environment variable.
    pub fn env_remove(mut self, key: impl AsRef<str>) -> Self {
        self.env_remove.push(key.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the working directory, if one was set.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Build the Command.
    fn build_command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        for key in &self.env_remove {
            cmd.env_remove(key);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Check the working directory and resolve the program to a runnable file.
    fn preflight(&self) -> Result<PathBuf, LaunchError> {
        if self.program.as_os_str().is_empty() {
            return Err(LaunchError::EmptyCommand);
        }

        if let Some(ref dir) = self.cwd {
            if !dir.exists() {
                return Err(LaunchError::MissingWorkingDir { dir: dir.clone() });
            }
            if !dir.is_dir() {
                return Err(LaunchError::NotADirectory { dir: dir.clone() });
            }
        }

        resolve_program(&self.program, self.cwd.as_deref())
    }

    /// Validate the invocation and spawn the child.
    ///
    /// stdout and stderr are piped; stdin is closed.
    pub fn start(&self) -> Result<ProcessHandle, LaunchError> {
        self.spawn(false)
    }

    /// Like [`start`](Self::start), but on Unix the child leads a new process
    /// group and [`ProcessHandle::kill`] signals the whole group, reaching
    /// anything the child forked.
    ///
    /// The group is detached from the terminal's foreground group, so Ctrl-C
    /// no longer reaches the child directly.
    pub fn start_in_own_group(&self) -> Result<ProcessHandle, LaunchError> {
        self.spawn(true)
    }

    fn spawn(&self, own_group: bool) -> Result<ProcessHandle, LaunchError> {
        let program = self.preflight()?;

        let mut cmd = self.build_command(&program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if own_group {
                cmd.process_group(0);
            }
        }

        let child = cmd.spawn().map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound {
                program: self.program.clone(),
            },
            io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied {
                program: self.program.clone(),
            },
            _ => LaunchError::Spawn {
                program: self.program.clone(),
                source,
            },
        })?;

        tracing::debug!(
            pid = child.id(),
            own_group,
            "spawned `{}`",
            self.display_command()
        );

        Ok(ProcessHandle {
            child,
            #[cfg(unix)]
            own_group,
        })
    }

    /// Execute the command and wait for completion, capturing all output.
    pub fn exec(&self) -> Result<Output> {
        let program = self.preflight()?;
        let mut cmd = self.build_command(&program);
        cmd.stdin(Stdio::null());

        let output = cmd
            .output()
            .with_context(|| format!("failed to run `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute with captured output and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Display the command for messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// A running child process.
///
/// Both output pipes are handed out once with [`take_stdout`](Self::take_stdout)
/// and [`take_stderr`](Self::take_stderr).
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    /// The child leads its own process group.
    #[cfg(unix)]
    own_group: bool,
}

impl ProcessHandle {
    /// Take the stdout pipe.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr pipe.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Block until the child exits.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    /// Wait until the child exits or `deadline` passes.
    ///
    /// Returns `Ok(None)` when the deadline expired; the child is still running.
    pub fn wait_deadline(&mut self, deadline: Instant) -> io::Result<Option<ExitStatus>> {
        let mut backoff = Duration::from_millis(1);
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(backoff.min(deadline - now));
            backoff = (backoff * 2).min(Duration::from_millis(50));
        }
    }

    /// Kill the child, or its whole process group when it was started with
    /// [`ProcessBuilder::start_in_own_group`]. Killing an already-exited child
    /// is not an error.
    pub fn kill(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if self.own_group {
                let pgid = Pid::from_raw(self.child.id() as i32);
                return match killpg(pgid, Signal::SIGKILL) {
                    Ok(()) | Err(Errno::ESRCH) => Ok(()),
                    Err(errno) => Err(errno.into()),
                };
            }
        }

        match self.child.kill() {
            Err(e) if e.kind() != io::ErrorKind::InvalidInput => Err(e),
            _ => Ok(()),
        }
    }
}

/// Map an exit status to the integer code the child reported.
///
/// On Unix a signal-terminated child maps to `128 + signal`, as shells do.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

/// Resolve the program to an existing, runnable file.
///
/// Paths with a directory component are checked directly (relative ones
/// against `cwd`); bare names are searched on `PATH`.
fn resolve_program(program: &Path, cwd: Option<&Path>) -> Result<PathBuf, LaunchError> {
    let has_dir = program.components().count() > 1 || program.is_absolute();

    if !has_dir {
        return which::which(program).map_err(|_| LaunchError::NotFound {
            program: program.to_path_buf(),
        });
    }

    let candidate = match cwd {
        Some(dir) if program.is_relative() => dir.join(program),
        _ => program.to_path_buf(),
    };

    if !candidate.exists() {
        return Err(LaunchError::NotFound {
            program: program.to_path_buf(),
        });
    }
    if !candidate.is_file() || !is_executable(&candidate) {
        return Err(LaunchError::NotExecutable {
            program: program.to_path_buf(),
        });
    }

    Ok(candidate)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
