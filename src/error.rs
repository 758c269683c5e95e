//! Error types for the popup mediator

use thiserror::Error;

/// How a failure is treated once it reaches the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or foreign message: dropped, never answered
    Validation,
    /// A bounded wait ran out: take the conservative path
    Timeout,
    /// Shown to the user with retry/reject still available
    Recoverable,
    /// No way forward; the popup has to be closed
    Fatal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Status provider error: {0}")]
    Status(String),

    #[error("Credential recovery error: {0}")]
    Recovery(String),

    #[error("Envelope error: {0}")]
    Codec(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    /// The envelope was signed but could not be submitted.
    #[error("Submission failed: {reason}")]
    Submission {
        signed_envelope: String,
        reason: String,
    },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No referring window is attached to this popup")]
    NoOpener,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Config(_) | Error::NoOpener => ErrorKind::Fatal,
            _ => ErrorKind::Recoverable,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
