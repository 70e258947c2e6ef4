//! Transport contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::TransportError,
    message::{RequestOptions, ToolCall, ToolResult},
    relay::RelayHandler,
    signer::Signer,
};

/// Channel to a remote server.
///
/// Methods take `&self`; implementations keep their own connection state so
/// that one handle can be shared by concurrent callers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel.
    async fn open(&self) -> Result<(), TransportError>;

    /// Close the channel and release its resources.
    async fn close(&self) -> Result<(), TransportError>;

    /// Send one request and wait for its response envelope.
    async fn send_request(
        &self,
        call: ToolCall,
        options: RequestOptions,
    ) -> Result<ToolResult, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(&self) -> Result<(), TransportError> {
        (**self).open().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        (**self).close().await
    }

    async fn send_request(
        &self,
        call: ToolCall,
        options: RequestOptions,
    ) -> Result<ToolResult, TransportError> {
        (**self).send_request(call, options).await
    }
}

/// Payload encryption negotiated with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Encrypt when the server supports it.
    #[default]
    Optional,
    /// Refuse to talk to servers without encryption.
    Required,
    /// Never encrypt.
    Disabled,
}

/// Resolved inputs for building the base transport.
#[derive(Debug, Clone)]
pub struct BaseTransportParams {
    /// Hex public key of the target server.
    pub server_pubkey: String,
    /// Identity used to sign outgoing events.
    pub signer: Arc<dyn Signer>,
    /// Relays used to reach the server.
    pub relay_handler: Arc<dyn RelayHandler>,
    /// Skip the initialization handshake.
    pub is_stateless: bool,
    /// Payload encryption mode.
    pub encryption_mode: EncryptionMode,
    /// Further options passed through to the transport untouched.
    pub extra: Map<String, Value>,
}

/// Builds the protocol transport from resolved parameters.
pub trait TransportFactory: Send + Sync {
    /// Construct the base transport. Must not perform I/O.
    fn build(&self, params: BaseTransportParams) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(BaseTransportParams) -> Arc<dyn Transport> + Send + Sync,
{
    fn build(&self, params: BaseTransportParams) -> Arc<dyn Transport> {
        self(params)
    }
}
