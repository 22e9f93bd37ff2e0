//! Crank - A command dispatcher for building and running a native project
//!
//! This crate provides the library side of the `crank` tool: launching
//! external programs with streamed output, the project context and program
//! registry, and the build, demo and Python operations built on top of them.

pub mod core;
pub mod exec;
pub mod ops;
pub mod util;

pub use core::{BuildConfig, BuildOverrides, ProjectContext, ProgramRegistry};
pub use exec::{run, OutputSink, RunError, RunOptions, RunResult};
pub use util::process::{LaunchError, ProcessBuilder};
