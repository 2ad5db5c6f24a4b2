use std::fmt;
use std::str::FromStr;

use crate::utils::constants::{LOGIN_OK, LOGIN_REJECTED};
use crate::utils::errors::ParseEnumError;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UserStatus {
    Online,
    Offline,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            UserStatus::Offline => "offline",
            UserStatus::Online => "online",
        };
        write!(f, "{}", status)
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(UserStatus::Offline),
            "online" => Ok(UserStatus::Online),
            _ => Err(ParseEnumError::InvalidVariant),
        }
    }
}

//One command frame from an active session. Each variant maps to a single ascii digit on the wire.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum Command {
    ListKnown,
    ListConnected,
    SendTo,
    SendConnected,
    SendAll,
    Fetch,
    Exit,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::ListKnown,
        Command::ListConnected,
        Command::SendTo,
        Command::SendConnected,
        Command::SendAll,
        Command::Fetch,
        Command::Exit,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            Command::ListKnown => "1",
            Command::ListConnected => "2",
            Command::SendTo => "3",
            Command::SendConnected => "4",
            Command::SendAll => "5",
            Command::Fetch => "6",
            Command::Exit => "7",
        }
    }

    /// Menu text shown by the interactive shell.
    pub fn describe(&self) -> &'static str {
        match self {
            Command::ListKnown => "Display the names of all known users.",
            Command::ListConnected => "Display the names of all currently connected users.",
            Command::SendTo => "Send a text message to a particular user.",
            Command::SendConnected => "Send a text message to all currently connected users.",
            Command::SendAll => "Send a text message to all known users.",
            Command::Fetch => "Get my messages.",
            Command::Exit => "Exit.",
        }
    }

    pub fn has_response(&self) -> bool {
        matches!(
            self,
            Command::ListKnown | Command::ListConnected | Command::Fetch
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

impl FromStr for Command {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_wire() == s)
            .ok_or(ParseEnumError::InvalidVariant)
    }
}

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum LoginReply {
    Accepted,
    Rejected,
}

impl LoginReply {
    pub fn as_wire(&self) -> &'static str {
        match self {
            LoginReply::Accepted => LOGIN_OK,
            LoginReply::Rejected => LOGIN_REJECTED,
        }
    }
}

impl FromStr for LoginReply {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            LOGIN_OK => Ok(LoginReply::Accepted),
            LOGIN_REJECTED => Ok(LoginReply::Rejected),
            _ => Err(ParseEnumError::InvalidVariant),
        }
    }
}
