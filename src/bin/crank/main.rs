//! Crank CLI - A command dispatcher for building and running a native project

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod repl;

use cli::{Cli, Commands, MessageFormat};
use commands::Session;
use crank::core::{default_home, ProjectContext};
use crank::util::Shell;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse();
    let global = cli.global;

    // Set up logging
    let filter = if global.verbose {
        EnvFilter::new("crank=debug")
    } else {
        EnvFilter::new("crank=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let shell = Shell::from_flags(
        global.quiet,
        global.verbose,
        global.color,
        global.message_format == MessageFormat::Json,
    );

    // Build the project context
    let home = match global.knell_home {
        Some(home) => home,
        None => default_home()?,
    };
    let ctx = ProjectContext::new(home, global.config)?;
    let mut session = Session::new(ctx, shell);

    // Execute command
    let Some(command) = cli.command else {
        return repl::run(&mut session);
    };

    let code = match command {
        Commands::Clean(args) => session.run(args),
        Commands::Gen(args) => session.run(args),
        Commands::Build(args) => session.run(args),
        Commands::Check(args) => session.run(args),
        Commands::Demo(args) => session.run(args),
        Commands::Run(args) => session.run(args),
        Commands::Env(args) => session.run(args),
        Commands::Register(args) => session.run(args),
        Commands::Default(args) => session.run(args),
        Commands::Source(args) => session.run(args),
        Commands::Save(args) => session.run(args),
        Commands::Load(args) => session.run(args),
        Commands::Pysetup(args) => session.run(args),
        Commands::Pycheck(args) => session.run(args),
        Commands::Completions(args) => commands::completions::execute(&args)?,
        Commands::Shell => repl::run(&mut session)?,
    };

    Ok(code)
}
