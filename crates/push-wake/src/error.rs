//! Error types for push-wake
//!
//! Most failures in this crate are absorbed where they happen: storage faults
//! degrade to empty lookups, transport faults become failed deliveries, and the
//! wake loop always ends in a terminal state. The variants below are what is
//! left for the places that do propagate (configuration load, admin parsing,
//! and the raw store/transport traits).

use thiserror::Error;

/// Result type alias for push-wake operations
pub type Result<T> = std::result::Result<T, PushWakeError>;

/// Main error type for push-wake operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushWakeError {
    /// Malformed profile, template or settings. Fatal at load time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No profile or no tokens. A normal path, never escalated.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connect, timeout or TLS failure talking to the push provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider reported the token as permanently invalid
    #[error("Provider rejected token {token}: {reason}")]
    ProviderRejected { token: String, reason: String },

    /// Token store unreachable or query failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Administrative command could not be parsed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Deadline elapsed
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<sqlx::Error> for PushWakeError {
    fn from(err: sqlx::Error) -> Self {
        PushWakeError::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for PushWakeError {
    fn from(err: config::ConfigError) -> Self {
        PushWakeError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for PushWakeError {
    fn from(err: serde_json::Error) -> Self {
        PushWakeError::InvalidCommand(err.to_string())
    }
}

impl From<reqwest::Error> for PushWakeError {
    fn from(err: reqwest::Error) -> Self {
        PushWakeError::Transport(err.to_string())
    }
}

// Convenience constructors
impl PushWakeError {
    pub fn config(msg: impl Into<String>) -> Self {
        PushWakeError::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        PushWakeError::NotFound(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        PushWakeError::Transport(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        PushWakeError::Storage(msg.into())
    }

    pub fn rejected(token: impl Into<String>, reason: impl Into<String>) -> Self {
        PushWakeError::ProviderRejected {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may try the same operation again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, PushWakeError::Transport(_) | PushWakeError::Storage(_) | PushWakeError::Timeout(_))
    }
}
