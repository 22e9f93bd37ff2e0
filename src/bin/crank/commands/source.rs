//! `crank source` command
//!
//! Runs a file of commands as if typed into the interactive shell. Blank
//! lines and lines starting with `#` are skipped. Stops at the first command
//! that fails and returns its exit code.

use anyhow::{bail, Context, Result};

use super::{execute_words, CommandArgs, Session};
use crate::cli::SourceArgs;
use crate::repl::split_words;
use crank::util::fs::read_to_string;

/// Nesting limit for files that source other files.
const MAX_SOURCE_DEPTH: usize = 16;

impl CommandArgs for SourceArgs {
    fn execute(self, session: &mut Session) -> Result<i32> {
        if session.source_depth >= MAX_SOURCE_DEPTH {
            bail!(
                "`source` nested more than {} levels deep at {}",
                MAX_SOURCE_DEPTH,
                self.file.display()
            );
        }

        let contents = read_to_string(&self.file)?;
        let commands = parse_commands(&contents)
            .with_context(|| format!("failed to parse {}", self.file.display()))?;

        session.source_depth += 1;
        let result = run_commands(session, &self.file.display().to_string(), &commands);
        session.source_depth -= 1;
        Ok(result)
    }
}

/// Split a command file into `(line number, words)` pairs.
fn parse_commands(contents: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let mut commands = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words = split_words(line).with_context(|| format!("line {}", index + 1))?;
        commands.push((index + 1, words));
    }
    Ok(commands)
}

fn run_commands(session: &mut Session, file: &str, commands: &[(usize, Vec<String>)]) -> i32 {
    for (line, words) in commands {
        tracing::debug!("{}:{}: {}", file, line, words.join(" "));
        let code = execute_words(session, words);
        if code != 0 {
            session.shell.error(format!(
                "{}:{}: `{}` failed with exit code {}",
                file,
                line,
                words.join(" "),
                code
            ));
            return code;
        }
    }
    0
}
