//! Transport assembly.
//!
//! Resolves the client's configuration into [`BaseTransportParams`], asks a
//! [`TransportFactory`] for the protocol transport and optionally wraps it in
//! [`PaymentCapture`]. Assembly performs no I/O. Configuration problems that
//! can be detected up front are held back and reported by the first `open`
//! or `send_request`.
//!
//! ## Precedence
//!
//! | input          | explicit option   | environment          | fallback                 |
//! |----------------|-------------------|----------------------|--------------------------|
//! | signer         | `signer`, `private_key` | `CLIENT_PRIVATE_KEY` | empty key (fails on use) |
//! | relay handler  | `relay_handler`, `relays` | `RELAYS`         | [`RelayPool::shared`]    |
//! | server pubkey  | `server_pubkey`   | `SERVER_PUBKEY`      | [`DEFAULT_SERVER_PUBKEY`] |

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{
    error::TransportError,
    message::{RequestOptions, ToolCall, ToolResult},
    payments::{PaymentCapture, PaymentHandler},
    relay::{RelayHandler, RelayPool},
    signer::{PrivateKeySigner, Signer},
    transport::{BaseTransportParams, EncryptionMode, Transport, TransportFactory},
};

/// Public key of the Lemonade Legends server.
pub const DEFAULT_SERVER_PUBKEY: &str =
    "fde21351fbc8604c27dcff3d507f8e9b15438f3bd04093ca3fd57cd6b36c58d0";

/// Environment variable holding the client's hex private key.
pub const PRIVATE_KEY_VAR: &str = "CLIENT_PRIVATE_KEY";

/// Environment variable overriding the server public key.
pub const SERVER_PUBKEY_VAR: &str = "SERVER_PUBKEY";

/// Environment variable with a comma-separated relay list.
pub const RELAYS_VAR: &str = "RELAYS";

/// Configuration values read from the process environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Hex private key.
    pub private_key: Option<String>,
    /// Server public key.
    pub server_pubkey: Option<String>,
    /// Relay URLs.
    pub relays: Option<Vec<String>>,
}

impl EnvConfig {
    /// Read from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            private_key: read(PRIVATE_KEY_VAR),
            server_pubkey: read(SERVER_PUBKEY_VAR),
            relays: read(RELAYS_VAR).map(|list| {
                list.split(',').map(str::trim).filter(|r| !r.is_empty()).map(String::from).collect()
            }),
        }
    }
}

impl fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("server_pubkey", &self.server_pubkey)
            .field("relays", &self.relays)
            .finish()
    }
}

/// Inputs to [`assemble_transport`]. Every field is optional.
#[derive(Clone, Default)]
pub struct TransportConfig {
    /// Hex private key, used when no `signer` is given.
    pub private_key: Option<String>,
    /// Explicit signer.
    pub signer: Option<Arc<dyn Signer>>,
    /// Relay URLs, used when no `relay_handler` is given.
    pub relays: Option<Vec<String>>,
    /// Explicit relay handler, e.g. a pool shared with other clients.
    pub relay_handler: Option<Arc<dyn RelayHandler>>,
    /// Target server public key.
    pub server_pubkey: Option<String>,
    /// Payload encryption mode.
    pub encryption_mode: EncryptionMode,
    /// Further transport options, passed through untouched.
    pub extra: Map<String, Value>,
    /// Payment handlers; `Some` enables payment capture.
    pub payment_handlers: Option<Vec<Arc<dyn PaymentHandler>>>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("signer", &self.signer)
            .field("relays", &self.relays)
            .field("relay_handler", &self.relay_handler)
            .field("server_pubkey", &self.server_pubkey)
            .field("encryption_mode", &self.encryption_mode)
            .field("extra", &self.extra)
            .field("payments", &self.payment_handlers.as_ref().map(Vec::len))
            .finish()
    }
}

impl TransportConfig {
    /// Resolve against `env` into base transport parameters.
    pub fn resolve(&self, env: &EnvConfig) -> BaseTransportParams {
        let signer: Arc<dyn Signer> = if let Some(signer) = &self.signer {
            Arc::clone(signer)
        } else {
            let key = non_empty(self.private_key.as_ref())
                .or(env.private_key.as_ref())
                .cloned()
                .unwrap_or_default();
            Arc::new(PrivateKeySigner::new(key))
        };

        let relay_handler: Arc<dyn RelayHandler> = if let Some(handler) = &self.relay_handler {
            Arc::clone(handler)
        } else if let Some(relays) = self.relays.as_ref().or(env.relays.as_ref()) {
            Arc::new(RelayPool::new(relays))
        } else {
            RelayPool::shared()
        };

        let server_pubkey = non_empty(self.server_pubkey.as_ref())
            .or(env.server_pubkey.as_ref())
            .map_or_else(|| DEFAULT_SERVER_PUBKEY.to_string(), Clone::clone);

        BaseTransportParams {
            server_pubkey,
            signer,
            relay_handler,
            is_stateless: true,
            encryption_mode: self.encryption_mode,
            extra: self.extra.clone(),
        }
    }
}

/// Build the transport described by `config`.
///
/// The result is the factory's base transport, wrapped in
/// [`PaymentCapture`] when payment handlers are configured. A detectable
/// configuration problem is returned by the first `open`/`send_request`.
pub fn assemble_transport(
    config: &TransportConfig,
    env: &EnvConfig,
    factory: &dyn TransportFactory,
) -> Arc<dyn Transport> {
    let params = config.resolve(env);
    let problem = validate(&params).err();
    if let Some(problem) = &problem {
        tracing::debug!("deferring configuration error: {}", problem);
    }

    let base = factory.build(params);
    let transport: Arc<dyn Transport> = match &config.payment_handlers {
        Some(handlers) => Arc::new(PaymentCapture::new(base, handlers.clone())),
        None => base,
    };

    match problem {
        Some(problem) => Arc::new(DeferredConfigError { problem, inner: transport }),
        None => transport,
    }
}

/// Check parameters that can be validated without I/O.
pub fn validate(params: &BaseTransportParams) -> Result<(), TransportError> {
    params.signer.secret_key()?;

    let mut pubkey = [0u8; 32];
    hex::decode_to_slice(&params.server_pubkey, &mut pubkey)
        .map_err(|e| TransportError::config(format!("invalid server pubkey: {e}")))?;

    if params.relay_handler.relays().is_empty() {
        return Err(TransportError::config("relay set is empty"));
    }

    Ok(())
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Holds a configuration error until the transport is first used.
struct DeferredConfigError {
    problem: TransportError,
    inner: Arc<dyn Transport>,
}

#[async_trait]
impl Transport for DeferredConfigError {
    async fn open(&self) -> Result<(), TransportError> {
        Err(self.problem.clone())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }

    async fn send_request(
        &self,
        _call: ToolCall,
        _options: RequestOptions,
    ) -> Result<ToolResult, TransportError> {
        Err(self.problem.clone())
    }
}
