//! Command implementations
//!
//! Every command is a clap argument struct implementing [`CommandArgs`]. The
//! one-shot CLI reaches them through the `Commands` enum; the interactive
//! shell and `source` look them up by name in [`COMMANDS`].

pub mod build;
pub mod check;
pub mod clean;
pub mod completions;
pub mod default;
pub mod demo;
pub mod env;
pub mod gen;
pub mod load;
pub mod pycheck;
pub mod pysetup;
pub mod register;
pub mod run;
pub mod save;
pub mod source;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::cli::{
    BuildArgs, CheckArgs, CleanArgs, DefaultArgs, DemoArgs, EnvArgs, GenArgs, LoadArgs,
    PycheckArgs, PysetupArgs, RegisterArgs, RunArgs, SaveArgs, SourceArgs,
};
use crank::core::ProjectContext;
use crank::exec::RunError;
use crank::util::diagnostic::{emit, Diagnostic};
use crank::util::process::LaunchError;
use crank::util::Shell;
use miette::{GraphicalReportHandler, GraphicalTheme};

/// State shared by the commands of one process or interactive session.
pub struct Session {
    pub ctx: ProjectContext,
    pub shell: Shell,
    /// Commands are being entered in the interactive shell.
    pub interactive: bool,
    /// Nesting of `source` commands currently running.
    pub source_depth: usize,
}

impl Session {
    pub fn new(ctx: ProjectContext, shell: Shell) -> Self {
        Session {
            ctx,
            shell,
            interactive: false,
            source_depth: 0,
        }
    }

    /// Execute a parsed command, reporting any error. Returns the exit code.
    pub fn run<T: CommandArgs>(&mut self, args: T) -> i32 {
        match args.execute(self) {
            Ok(code) => code,
            Err(e) => {
                self.report(&e);
                1
            }
        }
    }

    /// Print an error the way the shell is configured to.
    pub fn report(&self, err: &anyhow::Error) {
        if self.shell.is_json() {
            self.shell.error(format!("{:#}", err));
            return;
        }

        if let Some(diag) = err.downcast_ref::<Diagnostic>() {
            emit(diag, self.shell.use_color());
            return;
        }

        if let Some(RunError::Launch(launch)) = err.downcast_ref::<RunError>() {
            if let Some(rendered) = render_launch_error(launch, self.shell.use_color()) {
                eprint!("{}", rendered);
                return;
            }
        }

        eprintln!("error: {:#}", err);
    }

    /// Save the project configuration after a change, outside the interactive shell.
    pub fn autosave(&self) -> Result<()> {
        if !self.interactive {
            self.ctx.save()?;
            tracing::debug!("saved {}", self.ctx.config_path().display());
        }
        Ok(())
    }
}

/// Render a launch failure with its diagnostic code and help text.
fn render_launch_error(err: &LaunchError, color: bool) -> Option<String> {
    let theme = if color {
        GraphicalTheme::unicode()
    } else {
        GraphicalTheme::unicode_nocolor()
    };
    let mut out = String::new();
    GraphicalReportHandler::new_themed(theme)
        .render_report(&mut out, err)
        .ok()?;
    Some(out)
}

/// A command usable from both the command line and the interactive shell.
pub trait CommandArgs: Parser {
    fn execute(self, session: &mut Session) -> Result<i32>;
}

/// Entry in the command table.
pub struct CommandEntry {
    pub name: &'static str,
    /// Builds the argument parser, for help output.
    pub parser: fn() -> clap::Command,
    /// Parses the words of a line (command name first) and runs the command.
    pub handler: fn(&[String], &mut Session) -> Result<i32>,
}

fn invoke<T: CommandArgs>(words: &[String], session: &mut Session) -> Result<i32> {
    let args = T::try_parse_from(words)?;
    args.execute(session)
}

macro_rules! command {
    ($name:literal, $args:ty) => {
        CommandEntry {
            name: $name,
            parser: <$args as CommandFactory>::command,
            handler: invoke::<$args>,
        }
    };
}

/// Commands available by name, in help order.
pub static COMMANDS: &[CommandEntry] = &[
    // Build and test
    command!("clean", CleanArgs),
    command!("gen", GenArgs),
    command!("build", BuildArgs),
    command!("check", CheckArgs),
    // Run
    command!("demo", DemoArgs),
    command!("run", RunArgs),
    // Environment
    command!("env", EnvArgs),
    command!("register", RegisterArgs),
    command!("default", DefaultArgs),
    // Command history and automation
    command!("source", SourceArgs),
    command!("save", SaveArgs),
    command!("load", LoadArgs),
    // Development
    command!("pysetup", PysetupArgs),
    command!("pycheck", PycheckArgs),
];

/// Look a command up by name.
pub fn find(name: &str) -> Option<&'static CommandEntry> {
    COMMANDS.iter().find(|entry| entry.name == name)
}

/// Run one line that has already been split into words.
///
/// Unknown commands and argument errors are reported and yield a non-zero code.
pub fn execute_words(session: &mut Session, words: &[String]) -> i32 {
    let Some(name) = words.first() else {
        return 0;
    };

    let Some(entry) = find(name) else {
        session.shell.error(format!(
            "unknown command `{}`; type `help` for a list of commands",
            name
        ));
        return 1;
    };

    match (entry.handler)(words, session) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<clap::Error>() {
            Some(clap_err) => {
                let _ = clap_err.print();
                match clap_err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => 2,
                }
            }
            None => {
                session.report(&e);
                1
            }
        },
    }
}
