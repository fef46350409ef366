//! Error types shared by the client and the engine

use thiserror::Error;

/// Where a fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    Status(u16),
    Decode,
}

/// The single error surfaced by the remote catalog client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Network, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Timeout, message: message.into() }
    }

    pub fn status(code: u16) -> Self {
        Self { kind: FetchErrorKind::Status(code), message: format!("HTTP error: {}", code) }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Decode, message: message.into() }
    }

    /// Prefix the message with the sub-fetch it came from
    pub fn context(mut self, what: &str) -> Self {
        self.message = format!("{}: {}", what, self.message);
        self
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::decode(format!("Malformed JSON: {}", e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("{0}")]
    Validation(String),
    #[error("Invalid action: {0}")]
    State(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e.kind {
            FetchErrorKind::Decode => AppError::Decode(e.message),
            _ => AppError::Network(e.message),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
