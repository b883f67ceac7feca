//! Console line parsing: `/verb arg` commands and free-text chat.

use thiserror::Error;

use crate::protocol::{ClientMsg, CmdName};

pub const HELP: &str = "Syntax -- /<command> <argument>\n\
Commands available -- nick, invite, accept, decline, list, reset";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Nick(String),
    Invite(String),
    Accept(String),
    Decline(String),
    List,
    /// Restart the local board; never sent to the relay
    Reset,
    Chat(String),
}

/// Malformed console input. `Display` renders the inline help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("nothing to send\n{}", HELP)]
    Empty,
    #[error("unknown command /{0}\n{}", HELP)]
    UnknownCommand(String),
    #[error("/{0} needs an argument\n{}", HELP)]
    MissingArgument(&'static str),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ConsoleCommand::Chat(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::to_string);

    let with_arg = |name: &'static str, build: fn(String) -> ConsoleCommand| {
        arg.clone().map(build).ok_or(ConsoleError::MissingArgument(name))
    };

    match verb {
        "nick" => with_arg("nick", ConsoleCommand::Nick),
        "invite" => with_arg("invite", ConsoleCommand::Invite),
        "accept" => with_arg("accept", ConsoleCommand::Accept),
        "decline" => with_arg("decline", ConsoleCommand::Decline),
        "list" => Ok(ConsoleCommand::List),
        "reset" => Ok(ConsoleCommand::Reset),
        other => Err(ConsoleError::UnknownCommand(other.to_string())),
    }
}

impl ConsoleCommand {
    /// Message to send to the relay, `None` for local-only commands.
    pub fn to_client_msg(&self) -> Option<ClientMsg> {
        let cmd = |name, arg: &str| ClientMsg::Cmd {
            name,
            arg: Some(arg.to_string()),
        };
        match self {
            ConsoleCommand::Nick(n) => Some(cmd(CmdName::Nick, n)),
            ConsoleCommand::Invite(n) => Some(cmd(CmdName::Invite, n)),
            ConsoleCommand::Accept(n) => Some(cmd(CmdName::Accept, n)),
            ConsoleCommand::Decline(n) => Some(cmd(CmdName::Decline, n)),
            ConsoleCommand::List => Some(ClientMsg::Cmd {
                name: CmdName::List,
                arg: None,
            }),
            ConsoleCommand::Reset => None,
            ConsoleCommand::Chat(text) => Some(ClientMsg::ChatMessage { text: text.clone() }),
        }
    }
}
