//! Error types for the trustnet system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for trustnet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the trustnet system
#[derive(Error, Debug)]
pub enum Error {
    /// Provider table is full; no further registrations are admitted
    #[error("provider table is full: {count} providers registered, limit is {limit}")]
    ProviderLimit {
        /// Providers currently registered
        count: usize,
        /// Configured provider limit
        limit: usize,
    },

    /// A single provider declares too many addresses and ranges combined
    #[error("provider '{provider}' declares {count} addresses and ranges, limit is {limit}")]
    AddressLimit {
        /// Provider name
        provider: String,
        /// Combined address and range count
        count: usize,
        /// Configured per-provider limit
        limit: usize,
    },

    /// A declared CIDR range failed to parse for its address family
    #[error("provider '{provider}' declares invalid {family} range '{range}': {reason}")]
    InvalidRange {
        /// Provider name
        provider: String,
        /// Address family the range was declared under
        family: &'static str,
        /// The offending range string
        range: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Reload task errors
    #[error("reload error: {0}")]
    Reload(String),

    /// Provider-specific error
    #[error("provider error ({provider}): {message}")]
    Provider {
        /// Provider or mechanism name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a reload error
    pub fn reload(msg: impl Into<String>) -> Self {
        Self::Reload(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
