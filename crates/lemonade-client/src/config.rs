//! Client configuration.

use std::{fmt, sync::Arc, time::Duration};

use lemonade_transport::{
    EncryptionMode, PaymentHandler, RelayHandler, Signer, TransportConfig,
    message::DEFAULT_REQUEST_TIMEOUT,
};
use serde_json::{Map, Value};

/// Name and version announced to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self { name: "LemonadeLegendsClient".to_string(), version: "1.0.0".to_string() }
    }
}

/// Timeout behaviour of [`crate::LifecycleClient::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    /// Time allowed without a response or progress notification.
    pub timeout: Duration,
    /// Restart the timeout on every progress notification.
    pub reset_timeout_on_progress: bool,
    /// Upper bound on a call's total duration, progress or not.
    pub max_total_timeout: Option<Duration>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            reset_timeout_on_progress: true,
            max_total_timeout: None,
        }
    }
}

/// Constructor options for [`crate::LemonadeLegendsClient`].
///
/// Every field is optional. Explicit values take precedence over the
/// environment (`CLIENT_PRIVATE_KEY`, `SERVER_PUBKEY`, `RELAYS`), which takes
/// precedence over built-in defaults.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Hex private key, used when no `signer` is given.
    pub private_key: Option<String>,
    /// Explicit signer.
    pub signer: Option<Arc<dyn Signer>>,
    /// Relay URLs, used when no `relay_handler` is given.
    pub relays: Option<Vec<String>>,
    /// Relay handler, typically a pool shared with other clients.
    pub relay_handler: Option<Arc<dyn RelayHandler>>,
    /// Target server public key.
    pub server_pubkey: Option<String>,
    /// Payload encryption mode.
    pub encryption_mode: EncryptionMode,
    /// Further transport options, passed through untouched.
    pub transport_options: Map<String, Value>,
    /// Capture `payment_required` signals into a [`crate::PaymentUiStore`].
    /// Never pays.
    pub enable_payments_ui: bool,
    /// Request timeout behaviour.
    pub request: RequestConfig,
    /// Name and version announced to the server.
    pub info: ClientInfo,
}

impl ClientOptions {
    /// Transport configuration for these options.
    pub(crate) fn transport_config(
        &self,
        payment_handlers: Option<Vec<Arc<dyn PaymentHandler>>>,
    ) -> TransportConfig {
        TransportConfig {
            private_key: self.private_key.clone(),
            signer: self.signer.clone(),
            relays: self.relays.clone(),
            relay_handler: self.relay_handler.clone(),
            server_pubkey: self.server_pubkey.clone(),
            encryption_mode: self.encryption_mode,
            extra: self.transport_options.clone(),
            payment_handlers,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("signer", &self.signer)
            .field("relays", &self.relays)
            .field("relay_handler", &self.relay_handler)
            .field("server_pubkey", &self.server_pubkey)
            .field("encryption_mode", &self.encryption_mode)
            .field("transport_options", &self.transport_options)
            .field("enable_payments_ui", &self.enable_payments_ui)
            .field("request", &self.request)
            .field("info", &self.info)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_reset_on_progress() {
        let config = RequestConfig::default();
        assert!(config.reset_timeout_on_progress);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_total_timeout, None);
    }

    #[test]
    fn debug_redacts_private_key() {
        let options =
            ClientOptions { private_key: Some("deadbeef".to_string()), ..Default::default() };
        assert!(!format!("{options:?}").contains("deadbeef"));
    }

    #[test]
    fn transport_config_carries_options() {
        let options = ClientOptions {
            server_pubkey: Some("ab".repeat(32)),
            relays: Some(vec!["wss://nos.lol".to_string()]),
            encryption_mode: EncryptionMode::Required,
            ..Default::default()
        };

        let config = options.transport_config(None);

        assert_eq!(config.server_pubkey, options.server_pubkey);
        assert_eq!(config.relays, options.relays);
        assert_eq!(config.encryption_mode, EncryptionMode::Required);
        assert!(config.payment_handlers.is_none());
    }
}
