//! Error types for the callbox core library

use thiserror::Error;

/// Result type for callbox operations
pub type CallboxResult<T> = Result<T, CallboxError>;

/// Errors that can occur while driving a voice session
#[derive(Debug, Error)]
pub enum CallboxError {
    /// Fetching the access token failed
    #[error("Token fetch failed: {message}")]
    TokenFetch { message: String },

    /// The voice SDK rejected an operation
    #[error("Voice SDK error in {operation}: {details}")]
    Sdk {
        operation: String,
        details: String,
    },

    /// Operation not allowed in the current session phase
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// An initialization sequence is already in flight
    #[error("Initialization already in progress")]
    AlreadyInitializing,

    /// The device is already ready
    #[error("Voice device already initialized")]
    AlreadyInitialized,

    /// The device has not reported ready yet
    #[error("Voice device is not ready")]
    NotReady,

    /// The device reported it could not become ready
    #[error("Voice device not ready: {error}")]
    DeviceNotReady { error: String },

    /// No destination number was entered
    #[error("No destination number entered")]
    EmptyDestination,

    /// Operation timed out
    #[error("{operation} timed out after {duration_ms} ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Snapshot persistence error
    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CallboxError {
    /// Create a token fetch error
    pub fn token_fetch(message: impl Into<String>) -> Self {
        Self::TokenFetch {
            message: message.into(),
        }
    }

    /// Create an SDK error for the named operation
    pub fn sdk(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Sdk {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a snapshot error
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CallboxError {
    fn from(err: reqwest::Error) -> Self {
        Self::token_fetch(err.to_string())
    }
}
