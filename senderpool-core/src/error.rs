//! Error types shared by every SenderPool crate.

use thiserror::Error;

/// Main error type for SenderPool operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Coordination service unreachable, a required node missing, or a node
    /// holding a record that could not be parsed
    #[error("Discovery failed: {message}")]
    Discovery {
        /// What went wrong while reading the broker topology
        message: String,
    },

    /// No permit became available before the caller's deadline
    #[error("Timed out after {timeout_ms}ms waiting for an idle handle")]
    PoolTimeout {
        /// The deadline the caller supplied, in milliseconds
        timeout_ms: u64,
    },

    /// The pool has been shut down
    #[error("Handle pool is shut down")]
    PoolClosed,

    /// The broker connection behind a handle failed
    #[error("Handle fault: {message}")]
    HandleFault {
        /// Failure reported by the broker client
        message: String,
    },

    /// A handle was released to a pool that did not create it
    #[error("Handle {handle} does not belong to this pool")]
    ForeignHandle {
        /// Identifier of the rejected handle
        handle: String,
    },

    /// A caller supplied encoder could not produce a payload
    #[error("Encoding error: {message}")]
    Encoding {
        /// Encoder failure
        message: String,
    },

    /// Topic name rejected
    #[error("Invalid topic: {message}")]
    InvalidTopic {
        /// Why the name was rejected
        message: String,
    },

    /// Endpoint string rejected
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending input
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Shorthand for a [`Error::Discovery`] error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery { message: message.into() }
    }

    /// Shorthand for a [`Error::HandleFault`] error.
    pub fn handle_fault(message: impl Into<String>) -> Self {
        Self::HandleFault { message: message.into() }
    }

    /// Whether retrying the same call later can succeed without any
    /// change on the caller's side.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolTimeout { .. } | Self::HandleFault { .. })
    }
}

/// Result type alias for SenderPool operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding { message: err.to_string() }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(format!("Failed to parse TOML: {err}"))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Configuration(format!("Failed to serialize TOML: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Configuration(format!("Validation failed: {errors}"))
    }
}
