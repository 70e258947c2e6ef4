//! Typed operations of the Lemonade Legends server.

use std::sync::Arc;

use async_trait::async_trait;
use lemonade_transport::{
    EnvConfig, Environment, PaymentHandler, PaymentUiStore, SystemEnv, TransportFactory,
    UiOnlyPaymentHandler, assemble_transport,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::{
    config::ClientOptions,
    error::ClientError,
    lifecycle::{ConnectionState, LifecycleClient},
};

/// Remote name of the mint operation.
pub const MINT_BADGE_TOOL: &str = "mint_badge";

/// Remote name of the stats operation.
pub const STATS_TOOL: &str = "stats";

/// Arguments of `mint_badge`.
pub type MintBadgeInput = Map<String, Value>;

/// Result of `mint_badge`, as returned by the server.
pub type MintBadgeOutput = Map<String, Value>;

/// Arguments of `stats`.
pub type StatsInput = Map<String, Value>;

/// Result of `stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsOutput {
    /// Public keys holding a badge, when the server reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkeys: Option<Vec<String>>,
    /// Any further fields the server includes, kept as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Operations offered by the Lemonade Legends server.
#[async_trait]
pub trait LemonadeLegends: Send + Sync {
    /// Mint a "lemonade-legends" badge for your Nostr profile.
    ///
    /// Issues a NIP-58 badge award event to your pubkey. The server may ask
    /// for payment first.
    async fn mint_badge(&self, args: MintBadgeInput) -> Result<MintBadgeOutput, ClientError>;

    /// Statistics about issued badges and current pricing.
    async fn stats(&self, args: StatsInput) -> Result<StatsOutput, ClientError>;
}

/// Client for the Lemonade Legends server.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time
pub struct LemonadeLegendsClient<E: Environment = SystemEnv> {
    client: LifecycleClient<E>,
    payments: Option<Arc<PaymentUiStore>>,
}

impl LemonadeLegendsClient<SystemEnv> {
    /// Public key of the Lemonade Legends server.
    pub const SERVER_PUBKEY: &'static str = lemonade_transport::DEFAULT_SERVER_PUBKEY;

    /// Relays used when none are configured.
    pub const DEFAULT_RELAYS: &'static [&'static str] = lemonade_transport::DEFAULT_RELAYS;

    /// Build a client from `options` and the process environment.
    ///
    /// No I/O happens here; the transport opens on first use.
    pub fn new(options: ClientOptions, factory: &dyn TransportFactory) -> Self {
        Self::with_environment(options, &EnvConfig::from_env(), factory, SystemEnv::new())
    }
}

impl<E: Environment> LemonadeLegendsClient<E> {
    /// Build a client with explicit environment configuration and clock.
    pub fn with_environment(
        options: ClientOptions,
        env_config: &EnvConfig,
        factory: &dyn TransportFactory,
        env: E,
    ) -> Self {
        let payments = options.enable_payments_ui.then(|| Arc::new(PaymentUiStore::new()));
        let handlers = payments.as_ref().map(|store| {
            let handler: Arc<dyn PaymentHandler> =
                Arc::new(UiOnlyPaymentHandler::new(store.clone(), env.clone()));
            vec![handler]
        });

        let config = options.transport_config(handlers);
        let transport = assemble_transport(&config, env_config, factory);
        let client = LifecycleClient::new(transport, options.info, options.request, env);

        Self { client, payments }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Open the connection (coalesced with concurrent callers).
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.client.connect().await
    }

    /// Connect in the background, logging failures.
    pub fn connect_in_background(&self) -> JoinHandle<()> {
        self.client.connect_in_background()
    }

    /// Close the client for good. Never fails.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Latest captured payment demand. `None` when payments UI is disabled.
    pub fn payments(&self) -> Option<&Arc<PaymentUiStore>> {
        self.payments.as_ref()
    }

    /// The underlying lifecycle client.
    pub fn lifecycle(&self) -> &LifecycleClient<E> {
        &self.client
    }
}

#[async_trait]
impl<E: Environment> LemonadeLegends for LemonadeLegendsClient<E> {
    async fn mint_badge(&self, args: MintBadgeInput) -> Result<MintBadgeOutput, ClientError> {
        self.client.call(MINT_BADGE_TOOL, args).await
    }

    async fn stats(&self, args: StatsInput) -> Result<StatsOutput, ClientError> {
        self.client.call(STATS_TOOL, args).await
    }
}
