//! CMake-driven build operations: clean, gen, build and check.
//!
//! The project is always generated out of source: `cmake ..` runs inside the
//! build directory, and later builds run `cmake --build .` from there.

use std::path::Path;

use anyhow::Result;

use crate::core::context::{BuildConfig, ProjectContext};
use crate::exec::RunOptions;
use crate::ops::{run_streamed, verify_build_dir};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::{ensure_dir, path_kind, remove_dir_all_if_exists, PathKind};
use crate::util::platform::{default_generator, DEFAULT_VS_ARCH};
use crate::util::process::ProcessBuilder;
use crate::util::shell::{Shell, Status};

/// Alias under which CMake must be registered.
pub const CMAKE_ALIAS: &str = "cmake";

/// Generator used when an explicit compiler is given on Windows.
const MAKEFILES_GENERATOR: &str = "Unix Makefiles";

/// Options for [`gen`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GenOptions {
    /// Wipe an existing build directory.
    pub force: bool,
    /// Build with ccache.
    pub enable_ccache: bool,
    pub dry_run: bool,
}

/// Remove the build directory.
pub fn clean(ctx: &ProjectContext, shell: &Shell, dry_run: bool) -> Result<i32> {
    let build_dir = ctx.build_dir();
    match path_kind(&build_dir) {
        PathKind::Missing => {
            tracing::debug!("nothing to clean at {}", build_dir.display());
            Ok(0)
        }
        PathKind::Other => Err(Diagnostic::error(format!(
            "Build directory {} is not a directory",
            build_dir.display()
        ))
        .into()),
        PathKind::Directory if dry_run => {
            shell.status(Status::DryRun, format!("remove {}", build_dir.display()));
            Ok(0)
        }
        PathKind::Directory => {
            remove_dir_all_if_exists(&build_dir)?;
            shell.status(Status::Removed, build_dir.display());
            Ok(0)
        }
    }
}

/// Create the build directory and generate the project into it.
pub fn gen(ctx: &ProjectContext, shell: &Shell, opts: &GenOptions) -> Result<i32> {
    let cmake = ctx.programs().verify_executable(CMAKE_ALIAS)?;
    let compiler = match ctx.compiler() {
        Some(alias) => Some(ctx.programs().verify_executable(alias)?),
        None => None,
    };

    let build_dir = ctx.build_dir();
    match path_kind(&build_dir) {
        PathKind::Other => {
            return Err(Diagnostic::error(format!(
                "Build directory {} exists as something other than a directory",
                build_dir.display()
            ))
            .into());
        }
        PathKind::Directory if !opts.force => {
            return Err(
                Diagnostic::error(format!("{} exists", build_dir.display()))
                    .with_suggestion(suggestions::GEN_FORCE)
                    .into(),
            );
        }
        PathKind::Directory if opts.dry_run => {
            shell.status(Status::DryRun, format!("remove {}", build_dir.display()));
        }
        PathKind::Directory => {
            remove_dir_all_if_exists(&build_dir)?;
            shell.status(Status::Removed, build_dir.display());
        }
        PathKind::Missing => {}
    }

    if opts.dry_run {
        shell.status(Status::DryRun, format!("create {}", build_dir.display()));
    } else {
        ensure_dir(&build_dir)?;
        shell.status(Status::Created, build_dir.display());
    }

    let generator = if cfg!(windows) && compiler.is_none() {
        query_default_generator(&cmake)
    } else {
        None
    };

    let cmd = ProcessBuilder::new(&cmake)
        .args(configure_args(
            compiler.as_deref(),
            opts.enable_ccache,
            cfg!(windows),
            generator.as_deref(),
        ))
        .cwd(&build_dir);

    run_streamed(shell, &cmd, &RunOptions::default(), opts.dry_run)
}

/// Build the generated project.
pub fn build(ctx: &ProjectContext, shell: &Shell, dry_run: bool) -> Result<i32> {
    let cmake = ctx.programs().verify_executable(CMAKE_ALIAS)?;
    let build_dir = ctx.build_dir();
    verify_build_dir(&build_dir)?;

    let cmd = ProcessBuilder::new(&cmake)
        .args(build_args(ctx.build_config(), parallel_jobs()))
        .cwd(&build_dir);

    run_streamed(shell, &cmd, &RunOptions::default(), dry_run)
}

/// Build and run the test target.
pub fn check(ctx: &ProjectContext, shell: &Shell, iterate: bool, dry_run: bool) -> Result<i32> {
    let cmake = ctx.programs().verify_executable(CMAKE_ALIAS)?;
    let build_dir = ctx.build_dir();
    verify_build_dir(&build_dir)?;

    let cmd = ProcessBuilder::new(&cmake)
        .args(check_args(ctx.build_config(), iterate))
        .cwd(&build_dir);

    run_streamed(shell, &cmd, &RunOptions::default(), dry_run)
}

/// Arguments for the configure step, run from inside the build directory.
///
/// On Windows the generator is chosen explicitly: Makefiles when a compiler is
/// given, otherwise CMake's default generator targeting x64.
pub fn configure_args(
    compiler: Option<&Path>,
    enable_ccache: bool,
    windows: bool,
    default_generator: Option<&str>,
) -> Vec<String> {
    let mut args = vec!["..".to_string()];
    if enable_ccache {
        args.push("-DKN_ENABLE_CCACHE=1".to_string());
    }
    if let Some(compiler) = compiler {
        args.push(format!("-DCMAKE_C_COMPILER={}", compiler.display()));
    }

    if windows {
        match (compiler, default_generator) {
            (Some(_), _) => {
                args.extend(["-G".to_string(), MAKEFILES_GENERATOR.to_string()]);
            }
            (None, Some(generator)) => {
                args.extend([
                    "-G".to_string(),
                    generator.to_string(),
                    "-A".to_string(),
                    DEFAULT_VS_ARCH.to_string(),
                ]);
            }
            (None, None) => {}
        }
    }

    args
}

/// Arguments for `cmake --build`.
pub fn build_args(config: BuildConfig, jobs: usize) -> Vec<String> {
    vec![
        "--build".to_string(),
        ".".to_string(),
        "--parallel".to_string(),
        jobs.to_string(),
        "--config".to_string(),
        config.to_string(),
    ]
}

/// Arguments for building the `check` (or `check-iterate`) target.
pub fn check_args(config: BuildConfig, iterate: bool) -> Vec<String> {
    let target = if iterate { "check-iterate" } else { "check" };
    vec![
        "--build".to_string(),
        ".".to_string(),
        "--target".to_string(),
        target.to_string(),
        "--config".to_string(),
        config.to_string(),
    ]
}

fn parallel_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn query_default_generator(cmake: &Path) -> Option<String> {
    match ProcessBuilder::new(cmake).arg("--help").exec_and_check() {
        Ok(output) => {
            let generator = default_generator(&String::from_utf8_lossy(&output.stdout));
            tracing::debug!("default generator: {:?}", generator);
            generator
        }
        Err(e) => {
            tracing::warn!("could not determine the default CMake generator: {:#}", e);
            None
        }
    }
}
