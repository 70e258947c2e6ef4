//! Client error types.

use std::time::Duration;

use lemonade_transport::TransportError;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// `disconnect` has been called; the client cannot reconnect.
    #[error("client is closed")]
    Closed,

    /// The transport failed to open, send or receive.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No response (and no progress) within the request timeout.
    #[error("request {tool} timed out after {after:?}")]
    Timeout {
        /// Operation name.
        tool: String,
        /// Time since dispatch.
        after: Duration,
    },

    /// The server reported the operation as failed.
    #[error("{tool} failed: {message}")]
    Remote {
        /// Operation name.
        tool: String,
        /// Server supplied explanation.
        message: String,
    },

    /// The response did not carry the expected structured content.
    #[error("invalid response to {tool}: {reason}")]
    InvalidResponse {
        /// Operation name.
        tool: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ClientError {
    /// Returns true if the same operation may succeed when retried.
    ///
    /// Closed clients, bad configuration, payment demands and malformed
    /// responses stay the same on retry. Connection failures and timeouts
    /// may not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::Timeout { .. } => true,
            Self::Closed | Self::Remote { .. } | Self::InvalidResponse { .. } => false,
        }
    }
}
