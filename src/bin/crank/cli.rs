//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crank::core::{BuildConfig, BuildOverrides};
use crank::util::shell::ColorChoice;

/// Crank - A command dispatcher for building and running a native project
#[derive(Parser)]
#[command(name = "crank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Command to run; starts the interactive shell when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, env = "KNELL_HOME", value_name = "DIR")]
    pub knell_home: Option<PathBuf>,

    /// Configuration file (defaults to <knell home>/crank.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove the build directory
    Clean(CleanArgs),

    /// Create the build directory and generate the project
    Gen(GenArgs),

    /// Build the project
    Build(BuildArgs),

    /// Build and run the tests
    Check(CheckArgs),

    /// List built demos available to be run
    Demo(DemoArgs),

    /// Build and run a demo
    Run(RunArgs),

    /// Print the current configuration
    Env(EnvArgs),

    /// Register a program under an alias
    Register(RegisterArgs),

    /// Set a default configuration value
    Default(DefaultArgs),

    /// Run each line of a file as a command
    Source(SourceArgs),

    /// Save the configuration to a file
    Save(SaveArgs),

    /// Load the configuration from a file
    Load(LoadArgs),

    /// Set up the virtual environment for Python helpers
    Pysetup(PysetupArgs),

    /// Run Python linting
    Pycheck(PycheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Start the interactive shell
    Shell,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DryRunArg {
    /// Print what would be done without doing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// Build directory, relative to the knell home
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<String>,

    /// Build configuration (Debug or Release)
    #[arg(long, value_name = "CONFIG")]
    pub build_config: Option<BuildConfig>,

    /// Registered alias of the C compiler
    #[arg(long, value_name = "ALIAS")]
    pub compiler: Option<String>,
}

impl OverrideArgs {
    pub fn to_overrides(&self) -> BuildOverrides {
        BuildOverrides {
            build_dir: self.build_dir.clone(),
            build_config: self.build_config,
            compiler: self.compiler.clone(),
        }
    }
}

/// Remove the build directory
#[derive(Parser, Debug)]
#[command(name = "clean")]
pub struct CleanArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// Create the build directory and generate the project
#[derive(Parser, Debug)]
#[command(name = "gen")]
pub struct GenArgs {
    /// Wipe and recreate an existing build directory
    #[arg(long)]
    pub force: bool,

    /// Build with ccache
    #[arg(long)]
    pub enable_ccache: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// Build the project
#[derive(Parser, Debug)]
#[command(name = "build")]
pub struct BuildArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// Build and run the tests
#[derive(Parser, Debug)]
#[command(name = "check")]
pub struct CheckArgs {
    /// Run the iteration tests instead
    #[arg(long)]
    pub iterate: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// List built demos available to be run
#[derive(Parser, Debug)]
#[command(name = "demo")]
pub struct DemoArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Build and run a demo
#[derive(Parser, Debug)]
#[command(name = "run")]
pub struct RunArgs {
    /// Demo to run (defaults to the configured demo)
    pub demo: Option<String>,

    /// Stop the demo after this many ticks
    #[arg(long, value_name = "N")]
    pub tick_limit: Option<u64>,

    /// Kill the demo after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// Print the current configuration
#[derive(Parser, Debug)]
#[command(name = "env")]
pub struct EnvArgs {
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Register a program under an alias
#[derive(Parser, Debug)]
#[command(name = "register")]
pub struct RegisterArgs {
    /// Short name for the program, e.g. cmake
    pub alias: String,

    /// Path to the executable
    #[arg(required_unless_present = "find")]
    pub path: Option<PathBuf>,

    /// Register even if no file exists at the path
    #[arg(long)]
    pub force: bool,

    /// Replace an existing registration
    #[arg(long = "override")]
    pub override_existing: bool,

    /// Look the alias up on PATH
    #[arg(long, conflicts_with = "path")]
    pub find: bool,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// Set a default configuration value
#[derive(Parser, Debug)]
#[command(name = "default")]
pub struct DefaultArgs {
    /// Setting to change: compiler, build-config, build-dir or demo
    pub name: String,

    /// New value
    pub value: String,
}

/// Run each line of a file as a command
#[derive(Parser, Debug)]
#[command(name = "source")]
pub struct SourceArgs {
    /// File of commands, one per line
    pub file: PathBuf,
}

/// Save the configuration to a file
#[derive(Parser, Debug)]
#[command(name = "save")]
pub struct SaveArgs {
    /// Destination (defaults to the current configuration file)
    pub file: Option<PathBuf>,
}

/// Load the configuration from a file
#[derive(Parser, Debug)]
#[command(name = "load")]
pub struct LoadArgs {
    /// Configuration file to load
    pub file: PathBuf,
}

/// Set up the virtual environment for Python helpers
#[derive(Parser, Debug)]
#[command(name = "pysetup")]
pub struct PysetupArgs {
    /// Recreate the virtual environment from scratch
    #[arg(long)]
    pub clean: bool,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

/// Run Python linting
#[derive(Parser, Debug)]
#[command(name = "pycheck")]
pub struct PycheckArgs {
    /// Stop at the first failing check
    #[arg(long)]
    pub incremental: bool,

    #[command(flatten)]
    pub dry_run: DryRunArg,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "crank",
            "run",
            "sample",
            "--tick-limit",
            "10",
            "--build-config",
            "Release",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.demo.as_deref(), Some("sample"));
                assert_eq!(args.tick_limit, Some(10));
                assert_eq!(args.overrides.build_config, Some(BuildConfig::Release));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_register_requires_path_or_find() {
        assert!(RegisterArgs::try_parse_from(["register", "cmake"]).is_err());
        assert!(RegisterArgs::try_parse_from(["register", "cmake", "--find"]).is_ok());
        let args =
            RegisterArgs::try_parse_from(["register", "cmake", "/usr/bin/cmake", "--override"])
                .unwrap();
        assert!(args.override_existing);
    }

    #[test]
    fn test_no_command_means_shell() {
        let cli = Cli::try_parse_from(["crank", "--quiet"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.global.quiet);
    }
}
