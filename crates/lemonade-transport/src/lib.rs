//! Lemonade Legends Transport
//!
//! Seams and building blocks for talking to a ContextVM server over Nostr
//! relays. The wire protocol, event signing and relay networking live in
//! collaborators behind the traits defined here; this crate only assembles
//! them and layers optional payment capture on top.
//!
//! # Components
//!
//! - [`Transport`]: the `open` / `close` / `send_request` contract
//! - [`TransportFactory`]: builds the base transport from resolved parameters
//! - [`assemble_transport`]: resolves configuration and wraps the base
//!   transport
//! - [`PaymentCapture`]: decorator that reports `payment_required` signals to
//!   [`PaymentHandler`]s
//! - [`RelayPool`]: relay set shared between clients
//! - [`Environment`]: time and sleeping, swappable in tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assembly;
pub mod env;
mod error;
pub mod message;
pub mod payments;
pub mod relay;
pub mod signer;
mod transport;

pub use assembly::{DEFAULT_SERVER_PUBKEY, EnvConfig, TransportConfig, assemble_transport};
pub use env::{Environment, SystemEnv};
pub use error::TransportError;
pub use message::{Content, Progress, ProgressSink, RequestOptions, ToolCall, ToolResult};
pub use payments::{
    PaymentCapture, PaymentHandler, PaymentNotice, PaymentRequest, PaymentSink, PaymentStatus,
    PaymentUiStore, UI_ONLY_PMI, UiOnlyPaymentHandler,
};
pub use relay::{
    COMMON_RELAYS, DEFAULT_RELAYS, DEV_RELAYS, METADATA_RELAYS, RelayHandler, RelayPool,
};
pub use signer::{PrivateKeySigner, Signer};
pub use transport::{BaseTransportParams, EncryptionMode, Transport, TransportFactory};
