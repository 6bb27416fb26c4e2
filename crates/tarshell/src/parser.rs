//! Command line tokenizer
//!
//! Lines are split on whitespace; there is no quoting, escaping, globbing or
//! redirection. The first token selects a [`Command`].

use crate::error::CommandError;

/// How the command word is matched against the known commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// The first token must equal the command name.
    #[default]
    Exact,
    /// The line only has to start with the command name, checked in the
    /// order ls, cd, find, chown, exit (`lsfoo` runs `ls`). Kept for
    /// compatibility with scripts written against the legacy emulator.
    Prefix,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the current directory.
    Ls,
    /// Change the current directory.
    Cd { path: String },
    /// Recursively search for entries named `name`.
    Find { name: String },
    /// Acknowledge an ownership change without writing anything.
    Chown { owner: String, path: String },
    /// Stop the driving loop.
    Exit,
}

/// Parse a line into a [`Command`].
///
/// Unknown commands and wrong arities come back as the matching
/// [`CommandError`] so the caller can report them as result text.
pub fn parse(line: &str, mode: MatchMode) -> Result<Command, CommandError> {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    let word = tokens.next().unwrap_or("");
    let args: Vec<&str> = tokens.collect();

    let name = match mode {
        MatchMode::Exact => word,
        MatchMode::Prefix => ["ls", "cd", "find", "chown", "exit"]
            .into_iter()
            .find(|name| line.starts_with(name))
            .unwrap_or(word),
    };

    match name {
        "ls" => Ok(Command::Ls),
        "cd" => match args.as_slice() {
            [path] => Ok(Command::Cd {
                path: (*path).to_string(),
            }),
            _ => Err(CommandError::MalformedArguments {
                command: "cd",
                usage: "<path>",
            }),
        },
        "find" => match args.as_slice() {
            [name] => Ok(Command::Find {
                name: (*name).to_string(),
            }),
            _ => Err(CommandError::MalformedArguments {
                command: "find",
                usage: "<name>",
            }),
        },
        "chown" => match args.as_slice() {
            [owner, path] => Ok(Command::Chown {
                owner: (*owner).to_string(),
                path: (*path).to_string(),
            }),
            _ => Err(CommandError::MalformedArguments {
                command: "chown",
                usage: "<owner> <path>",
            }),
        },
        "exit" => Ok(Command::Exit),
        _ => Err(CommandError::UnsupportedCommand(line.to_string())),
    }
}
