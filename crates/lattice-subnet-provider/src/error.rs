//! Error types for subnet resolution
//!
//! Remote failures are produced by [`SubnetClient`](crate::SubnetClient)
//! implementations and surface to `list` callers unchanged.

use thiserror::Error;

/// Subnet provider error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The remote subnet listing call failed
    #[error("describe subnets failed: {message}")]
    DescribeSubnets {
        /// Error message from the remote client
        message: String,
        /// Whether the remote client considers this failure transient
        retryable: bool,
    },

    /// The caller cancelled while a remote fetch was outstanding
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was interrupted
        operation: String,
    },

    /// Invalid provider configuration
    #[error("configuration error for {key}: {message}")]
    Configuration {
        /// Configuration key (environment variable name)
        key: String,
        /// Description of what's invalid
        message: String,
    },

    /// Logging could not be initialised
    #[error("telemetry error: {message}")]
    Telemetry {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a retryable remote fetch error
    pub fn describe_subnets(msg: impl Into<String>) -> Self {
        Self::DescribeSubnets {
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a remote fetch error that retrying will not fix
    /// (e.g. malformed filter, missing permissions)
    pub fn describe_subnets_permanent(msg: impl Into<String>) -> Self {
        Self::DescribeSubnets {
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a telemetry error
    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::Telemetry {
            message: msg.into(),
        }
    }

    /// Whether the caller may retry the failed operation
    ///
    /// Only remote failures can be retryable; cancellation is final at this layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::DescribeSubnets { retryable: true, .. })
    }

    /// Whether this error was caused by caller cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Result type for subnet provider operations
pub type Result<T> = std::result::Result<T, Error>;
