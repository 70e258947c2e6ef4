//! Signing identities.
//!
//! Event signing itself happens in the protocol layer. This module only
//! carries the key material to it and reports malformed keys when they are
//! first used, not when the client is built.

use std::fmt;

use crate::error::TransportError;

/// Length of a secp256k1 secret key.
pub const SECRET_KEY_SIZE: usize = 32;

/// Source of the client's signing key.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Raw secret key bytes.
    fn secret_key(&self) -> Result<[u8; SECRET_KEY_SIZE], TransportError>;
}

/// Signer over a hex-encoded private key.
///
/// Construction never fails; an empty or malformed key surfaces as
/// [`TransportError::Config`] from [`Signer::secret_key`].
#[derive(Clone)]
pub struct PrivateKeySigner {
    hex_key: String,
}

impl PrivateKeySigner {
    /// Wrap a hex-encoded private key.
    pub fn new(hex_key: impl Into<String>) -> Self {
        Self { hex_key: hex_key.into() }
    }
}

impl fmt::Debug for PrivateKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeySigner").field("hex_key", &"<redacted>").finish()
    }
}

impl Signer for PrivateKeySigner {
    fn secret_key(&self) -> Result<[u8; SECRET_KEY_SIZE], TransportError> {
        let trimmed = self.hex_key.trim();
        if trimmed.is_empty() {
            return Err(TransportError::config("missing private key"));
        }

        let mut key = [0u8; SECRET_KEY_SIZE];
        hex::decode_to_slice(trimmed, &mut key)
            .map_err(|e| TransportError::config(format!("invalid private key: {e}")))?;

        if key.iter().all(|&b| b == 0) {
            return Err(TransportError::config("invalid private key: all zero"));
        }

        Ok(key)
    }
}
