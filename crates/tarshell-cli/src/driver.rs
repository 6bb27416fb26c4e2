//! Display driver: feeds input lines to a session and shows the results.
//!
//! On a terminal a line editor shows the session prompt. Piped input is
//! read line by line and each line is echoed after the prompt so the
//! transcript reads like a terminal session.

use anyhow::Result;
use std::io::{BufRead, IsTerminal};
use tarshell::{ExecResult, Session};

/// Why a session's input loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user ran `exit`.
    Exit,
    /// Input was exhausted.
    EndOfInput,
}

/// Show a command result: output on stdout, errors on stderr.
pub fn print_result(result: &ExecResult) {
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
}

/// Run the input loop for one session.
pub async fn run(session: &mut Session) -> Result<Outcome> {
    if std::io::stdin().is_terminal() {
        return run_terminal(session).await;
    }
    run_piped(session).await
}

#[cfg(feature = "interactive")]
async fn run_terminal(session: &mut Session) -> Result<Outcome> {
    use rustyline::error::ReadlineError;

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        match editor.readline(&session.prompt()) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                let result = session.execute(&line).await;
                print_result(&result);
                if result.is_exit() {
                    return Ok(Outcome::Exit);
                }
            }
            // Ctrl-C drops the current line, Ctrl-D ends the session
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(Outcome::EndOfInput),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(not(feature = "interactive"))]
async fn run_terminal(_session: &mut Session) -> Result<Outcome> {
    eprintln!("tarshell: interactive mode requires the 'interactive' feature");
    Ok(Outcome::EndOfInput)
}

async fn run_piped(session: &mut Session) -> Result<Outcome> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        println!("{}{}", session.prompt(), line);
        let result = session.execute(&line).await;
        print_result(&result);
        if result.is_exit() {
            return Ok(Outcome::Exit);
        }
    }
    Ok(Outcome::EndOfInput)
}
