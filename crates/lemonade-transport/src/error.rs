//! Transport error types.

use thiserror::Error;

use crate::payments::PaymentRequest;

/// Errors reported by a transport or its configuration.
///
/// `Clone` so that one failed connection attempt can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Identity, relay set or target server is missing or malformed.
    #[error("configuration error: {reason}")]
    Config {
        /// Description of the configuration problem.
        reason: String,
    },

    /// Opening the channel to the server failed.
    #[error("connection failed: {reason}")]
    Connection {
        /// Description of the connection failure.
        reason: String,
    },

    /// The server rejected the request or the round-trip failed.
    #[error("request failed: {reason}")]
    Request {
        /// Description of the request failure.
        reason: String,
    },

    /// The server requires a payment before releasing the result.
    #[error("payment required for request {}: {} sats", .0.request_event_id, .0.amount)]
    PaymentRequired(PaymentRequest),
}

impl TransportError {
    /// Shorthand for a [`TransportError::Config`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config { reason: reason.into() }
    }

    /// Shorthand for a [`TransportError::Connection`].
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection { reason: reason.into() }
    }

    /// Shorthand for a [`TransportError::Request`].
    pub fn request(reason: impl Into<String>) -> Self {
        Self::Request { reason: reason.into() }
    }

    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Request { .. } => true,
            Self::Config { .. } | Self::PaymentRequired(_) => false,
        }
    }
}
