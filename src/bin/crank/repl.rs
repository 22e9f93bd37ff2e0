//! Interactive shell.
//!
//! Reads lines with rustyline, splits them into words and runs them through
//! the command table. The project context lives for the whole session, so
//! registrations and defaults persist between lines until `save`.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;

use crate::commands::{execute_words, find, Session, COMMANDS};
use crank::util::process::ProcessBuilder;

/// Error splitting a line into words.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    #[error("line ends with an escape character")]
    TrailingBackslash,
}

/// Split a line into words.
///
/// Whitespace separates words. Single quotes keep everything literally;
/// double quotes keep everything except `\"` and `\\` escapes, so Windows
/// paths survive quoting. Outside quotes a backslash escapes the next
/// character.
pub fn split_words(line: &str) -> Result<Vec<String>, SplitError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(SplitError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        Some(c) => word.push(c),
                        None => return Err(SplitError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(escaped) => word.push(escaped),
                    None => return Err(SplitError::TrailingBackslash),
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }

    if in_word {
        words.push(word);
    }
    Ok(words)
}

/// Run the interactive shell until `quit`, `exit` or end of input.
///
/// Returns the exit code of the last command run.
pub fn run(session: &mut Session) -> Result<i32> {
    session.interactive = true;
    let mut editor = DefaultEditor::new()?;
    let mut last_code = 0;

    session
        .shell
        .note("running interactively; type `help` for commands, `quit` to leave");

    loop {
        let prompt = prompt(session.ctx.home());
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = editor.add_history_entry(line) {
            tracing::debug!("could not record history: {}", e);
        }

        let words = match split_words(line) {
            Ok(words) => words,
            Err(e) => {
                session.shell.error(e);
                continue;
            }
        };
        let Some(first) = words.first() else {
            continue;
        };

        let start = Instant::now();
        match first.as_str() {
            "quit" | "exit" => break,
            "help" => print_help(session, words.get(1).map(String::as_str)),
            _ => last_code = execute_words(session, &words),
        }

        if !session.shell.is_quiet() && !session.shell.is_json() {
            eprintln!("{} {:>8.2}s", line, start.elapsed().as_secs_f64());
        }
    }

    Ok(last_code)
}

/// `(crank <branch>) ` inside a git checkout, `(crank) ` elsewhere.
fn prompt(home: &Path) -> String {
    match current_branch(home) {
        Some(branch) => format!("(crank {}) ", branch),
        None => "(crank) ".to_string(),
    }
}

fn current_branch(home: &Path) -> Option<String> {
    let output = ProcessBuilder::new("git")
        .args(["branch", "--show-current"])
        .cwd(home)
        .exec()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty()).then_some(branch)
}

fn print_help(session: &Session, command: Option<&str>) {
    match command {
        Some(name) => match find(name) {
            Some(entry) => println!("{}", (entry.parser)().render_help()),
            None => session
                .shell
                .error(format!("no help for unknown command `{}`", name)),
        },
        None => {
            println!("Commands:");
            for entry in COMMANDS {
                let about = (entry.parser)()
                    .get_about()
                    .map(|about| about.to_string())
                    .unwrap_or_default();
                println!("  {:<10} {}", entry.name, about);
            }
            println!("  {:<10} {}", "help", "Show this list, or `help COMMAND` for details");
            println!("  {:<10} {}", "quit", "Leave the shell (also `exit` or Ctrl-D)");
        }
    }
}
