//! Running external programs with streamed output.
//!
//! [`run`] launches a [`ProcessBuilder`], drains the child's stdout and stderr
//! on two scoped threads into an [`OutputSink`], waits for the child and then
//! joins both drainers before returning the child's own exit code.
//!
//! ```text
//! NotStarted -> Launching -> Running -> Draining -> Completed
//!                   |                      |
//!                   \-> Failed(Launch)     \-> Failed(Wait)
//! ```
//!
//! `Failed` is normally reached only from `Launching`. If waiting on a child
//! that did start fails, the child is killed and reaped, both drainers are
//! joined and the run ends in `Failed` from `Draining` with [`RunError::Wait`].

pub mod drain;
pub mod sink;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::util::process::{exit_code, LaunchError, ProcessBuilder};

pub use drain::{drain, DrainStats};
pub use sink::{CaptureSink, Channel, ConsoleSink, LineFormat, OutputLine, OutputSink};

/// Failure of a [`run`] call.
#[derive(Debug, Error)]
pub enum RunError {
    /// The process never started.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The process started but waiting on it failed.
    #[error("failed to wait for `{}`", .program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Options for a single [`run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the child if it is still running after this long.
    ///
    /// With a timeout the child is started in a process group of its own
    /// (Unix), and the whole group is killed so that forked helpers release
    /// the output pipes too. A timeout too large to represent as a deadline
    /// is treated as no timeout.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        RunOptions {
            timeout: Some(timeout),
        }
    }
}

/// Outcome of a process that started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// The child's exit code.
    pub exit_code: i32,
    /// The child was killed because the timeout expired.
    pub timed_out: bool,
    pub stdout: DrainStats,
    pub stderr: DrainStats,
    /// Lines the sink failed to write.
    pub sink_failures: u64,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Lifecycle of one run, traced for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Launching,
    Running,
    Draining,
    Completed,
    /// From `Launching` when the child never started, or from `Draining`
    /// when waiting on a started child failed.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::NotStarted => "not-started",
            RunState::Launching => "launching",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct Transitions {
    state: RunState,
}

impl Transitions {
    fn new() -> Self {
        Transitions {
            state: RunState::NotStarted,
        }
    }

    fn to(&mut self, next: RunState) {
        tracing::trace!("run state {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Run a process to completion, streaming its output into `sink`.
///
/// Returns only after the child has been waited on and both output channels
/// reached end-of-stream. A child that starts and exits non-zero is `Ok`.
pub fn run(
    cmd: &ProcessBuilder,
    sink: &dyn OutputSink,
    opts: &RunOptions,
) -> Result<RunResult, RunError> {
    let mut lifecycle = Transitions::new();
    let failures_before = sink.write_failures();

    lifecycle.to(RunState::Launching);
    let started = if opts.timeout.is_some() {
        cmd.start_in_own_group()
    } else {
        cmd.start()
    };
    let mut handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            lifecycle.to(RunState::Failed);
            return Err(e.into());
        }
    };
    let stdout = handle.take_stdout();
    let stderr = handle.take_stderr();
    let deadline = opts.timeout.and_then(|t| {
        let deadline = Instant::now().checked_add(t);
        if deadline.is_none() {
            tracing::debug!("timeout of {:?} is out of range, waiting without one", t);
        }
        deadline
    });

    let (waited, out_stats, err_stats) = thread::scope(|s| {
        let out = s.spawn(|| {
            stdout
                .map(|r| drain(r, Channel::Stdout, sink))
                .unwrap_or_default()
        });
        let err = s.spawn(|| {
            stderr
                .map(|r| drain(r, Channel::Stderr, sink))
                .unwrap_or_default()
        });
        lifecycle.to(RunState::Running);

        let waited = match deadline {
            None => handle.wait().map(|status| (status, false)),
            Some(deadline) => match handle.wait_deadline(deadline) {
                Ok(Some(status)) => Ok((status, false)),
                Ok(None) => {
                    tracing::warn!(
                        "`{}` exceeded its time limit, terminating",
                        cmd.get_program().display()
                    );
                    handle.kill().and_then(|_| handle.wait()).map(|s| (s, true))
                }
                Err(e) => Err(e),
            },
        };
        if waited.is_err() {
            // Unblock the drainers; their pipes only close once the child is gone.
            let _ = handle.kill();
            let _ = handle.wait();
        }
        lifecycle.to(RunState::Draining);

        let out_stats = join_drainer(out);
        let err_stats = join_drainer(err);
        (waited, out_stats, err_stats)
    });

    let (status, timed_out) = waited.map_err(|source| {
        lifecycle.to(RunState::Failed);
        RunError::Wait {
            program: cmd.get_program().to_path_buf(),
            source,
        }
    })?;
    lifecycle.to(RunState::Completed);

    let sink_failures = sink.write_failures().saturating_sub(failures_before);
    if sink_failures > 0 {
        tracing::warn!("{} line(s) of child output could not be written", sink_failures);
    }

    Ok(RunResult {
        exit_code: exit_code(status),
        timed_out,
        stdout: out_stats,
        stderr: err_stats,
        sink_failures,
    })
}

fn join_drainer(handle: thread::ScopedJoinHandle<'_, DrainStats>) -> DrainStats {
    match handle.join() {
        Ok(stats) => stats,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
