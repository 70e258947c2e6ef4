//! Test harness for the Lemonade Legends client.
//!
//! Scripted implementations of the transport collaborators, so lifecycle and
//! payment behaviour can be exercised without relays or a server.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the connection
//! lifecycle. Operations are applied to both the model and the real client,
//! and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scripted;
pub mod sink;

pub use model::{ModelLifecycle, ModelState, ObservableState, Operation, OperationOutcome};
pub use scripted::{OpenStep, RequestStep, ScriptedFactory, ScriptedTransport};
pub use sink::RecordingSink;
