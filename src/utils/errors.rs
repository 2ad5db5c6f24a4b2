use std::io;

use thiserror::Error;

/// Failures while moving a single frame over a stream.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("frame of {len} bytes exceeds the 999 byte limit")]
    FrameTooLarge { len: usize },

    #[error("io error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
            _ => FrameError::Io(e),
        }
    }
}

impl FrameError {
    /// Both variants end the session the same way.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, FrameError::ConnectionClosed | FrameError::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("{name} is already logged in")]
    DuplicateSession { name: String },

    #[error("user registry is full ({capacity} users)")]
    RegistryFull { capacity: usize },

    #[error("connection idle for {0:?}")]
    IdleTimeout(std::time::Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unexpected reply from server: {0:?}")]
    UnexpectedReply(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseEnumError {
    #[error("invalid variant")]
    InvalidVariant,
}

pub type Result<T> = std::result::Result<T, RelayError>;
