//! Terminal input parsing
//!
//! Lines starting with `/` are commands; anything else is an open message
//! to the current group. `//` escapes a leading slash.

use icb_net::{Error, Result};

/// Server commands passed through unchanged
pub const PASS_THROUGH_COMMANDS: &[&str] = &[
    "whois", "p", "delete", "cp", "rname", "phone", "addr", "email", "text", "www", "read",
    "write", "secure", "nosecure", "info", "?", "invite", "v", "echoback", "name", "motd",
    "topic", "status", "boot", "pass", "drop", "shutdown", "wall", "whereis", "brick", "away",
    "noaway", "nobeep", "cancel", "exclude", "news", "notify", "s_help", "shuttime", "talk",
    "hush",
];

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Open(String),
    Private { target: String, text: String },
    Command { name: String, args: String },
    Who(String),
    Nick(String),
    Group(String),
    Boot(String),
    Beep(String),
    Ping(String),
    Quit,
}

/// Parse a line typed by the user. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Input>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Input::Open(line.to_string())));
    };
    if command.starts_with('/') {
        return Ok(Some(Input::Open(command.to_string())));
    }

    let (name, args) = split_word(command);
    let name = name.to_ascii_lowercase();

    let input = match name.as_str() {
        "quote" => {
            let (cmd, rest) = split_word(args);
            if cmd.is_empty() {
                return Err(missing("quote", "a command"));
            }
            Input::Command {
                name: cmd.to_string(),
                args: rest.to_string(),
            }
        }
        "w" | "who" => Input::Who(args.to_string()),
        "nick" => Input::Nick(args.to_string()),
        "kick" => Input::Boot(args.to_string()),
        "g" | "join" => {
            if args.is_empty() {
                return Err(missing("g", "a group"));
            }
            Input::Group(args.to_string())
        }
        "beep" => {
            if args.is_empty() {
                return Err(missing("beep", "a nick"));
            }
            Input::Beep(args.to_string())
        }
        "m" | "msg" => {
            let (target, text) = split_word(args);
            if target.is_empty() {
                return Err(missing("msg", "a nick"));
            }
            Input::Private {
                target: target.to_string(),
                text: text.to_string(),
            }
        }
        "ping" => Input::Ping(args.to_string()),
        "quit" | "exit" => Input::Quit,
        _ if PASS_THROUGH_COMMANDS.contains(&name.as_str()) => Input::Command {
            name,
            args: args.to_string(),
        },
        _ => return Err(Error::InvalidArgument(format!("unknown command /{}", name))),
    };

    Ok(Some(input))
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn missing(command: &str, what: &str) -> Error {
    Error::InvalidArgument(format!("/{} needs {}", command, what))
}
