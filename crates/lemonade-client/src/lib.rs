//! Lemonade Legends Client
//!
//! Client for the Lemonade Legends badge server. Wraps a ContextVM transport
//! in a connection lifecycle that coalesces concurrent `connect` and
//! `disconnect` calls, and exposes the server's operations as typed methods.
//!
//! # Architecture
//!
//! ```text
//! LemonadeLegendsClient      mint_badge / stats
//!   └─ LifecycleClient       connect / disconnect / call
//!        └─ Transport        assembled by lemonade-transport
//!             └─ PaymentCapture (optional)
//! ```
//!
//! # Components
//!
//! - [`LifecycleClient`]: connection state machine and request dispatch
//! - [`LemonadeLegendsClient`]: typed operations over [`LifecycleClient`]
//! - [`ClientOptions`]: constructor-time configuration
//! - [`ClientError`]: errors surfaced to callers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod legends;
mod lifecycle;

pub use config::{ClientInfo, ClientOptions, RequestConfig};
pub use error::ClientError;
pub use legends::{
    LemonadeLegends, LemonadeLegendsClient, MINT_BADGE_TOOL, MintBadgeInput, MintBadgeOutput,
    STATS_TOOL, StatsInput, StatsOutput,
};
pub use lemonade_transport::{
    EnvConfig, Environment, PaymentNotice, PaymentUiStore, SystemEnv, Transport, TransportError,
    TransportFactory,
};
pub use lifecycle::{ConnectionState, LifecycleClient};
