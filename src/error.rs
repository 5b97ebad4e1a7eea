//! Error types for nvlv-console.

use thiserror::Error;

/// Main error type for console operations.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// A command handler failed.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// A command argument could not be interpreted.
    #[error("invalid argument for {command}: '{value}'")]
    InvalidArgument { command: String, value: String },

    /// Expression referenced a variable that is not defined.
    #[error("{0} is not defined")]
    Undefined(String),

    /// Expression could not be evaluated.
    #[error("expression error: {0}")]
    Expression(String),

    /// A handler panicked and the panic was caught at the dispatch boundary.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Send attempted while the relay connection is not open.
    #[error("transport not connected")]
    NotConnected,

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound text is not a valid envelope.
    #[error("protocol parse error: {0}")]
    ProtocolParse(String),

    /// Persisted storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Coarse classification of [`ConsoleError`] used when reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Dispatch,
    Transport,
    ProtocolParse,
    Storage,
}

impl ConsoleError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected | Self::Transport(_) => ErrorKind::Transport,
            Self::ProtocolParse(_) | Self::Json(_) => ErrorKind::ProtocolParse,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
            _ => ErrorKind::Dispatch,
        }
    }
}

/// Convenience Result type for console operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;
