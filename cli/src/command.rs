//! Stdin line → chat command.

#[cfg(test)]
#[path = "command_test.rs"]
mod command_test;

use chatsync::Reference;

pub const HELP: &str = "\
commands:
  <text>        send a message (or the replacement text while editing)
  /edit N       edit your message number N
  /delete N     delete your message number N
  /cancel       stop editing
  /list         show the whole conversation
  /logout       sign out
  /quit         leave without signing out
  //text        send text that starts with '/'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    /// 1-based message position as listed.
    Edit(usize),
    Delete(usize),
    Cancel,
    List,
    Logout,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("/{0} needs a message number")]
    MissingNumber(&'static str),
    #[error("not a message number: {0}")]
    InvalidNumber(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_owned())));
    };
    if rest.starts_with('/') {
        return Ok(Some(Command::Say(rest.to_owned())));
    }

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let command = match name {
        "edit" => Command::Edit(parse_position("edit", arg)?),
        "delete" | "del" => Command::Delete(parse_position("delete", arg)?),
        "cancel" => Command::Cancel,
        "list" | "ls" => Command::List,
        "logout" => Command::Logout,
        "quit" | "exit" => Command::Quit,
        "help" | "?" => Command::Help,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

/// Store reference for a 1-based listed position.
pub fn position_reference(position: usize) -> Reference {
    Reference::Index(position.saturating_sub(1))
}

fn parse_position(command: &'static str, arg: Option<&str>) -> Result<usize, CommandError> {
    let raw = arg.ok_or(CommandError::MissingNumber(command))?;
    match raw.parse::<usize>() {
        Ok(position) if position >= 1 => Ok(position),
        _ => Err(CommandError::InvalidNumber(raw.to_owned())),
    }
}
