//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! client behaves identically to the reference lifecycle.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!    ModelLifecycle    RealClient      Compare
//!     (reference)    (scripted I/O)    Results
//! ```

use std::sync::Arc;

use lemonade_client::{
    ClientError, ClientOptions, ConnectionState, EnvConfig, LemonadeLegends,
    LemonadeLegendsClient, SystemEnv, TransportError,
};
use lemonade_harness::{
    ModelLifecycle, ModelState, ObservableState, OpenStep, Operation, OperationOutcome,
    RequestStep, ScriptedFactory, ScriptedTransport,
};
use lemonade_transport::ToolResult;
use proptest::prelude::*;
use serde_json::{Map, json};

const KEY: &str = "0202020202020202020202020202020202020202020202020202020202020202";

/// Real client wrapper that mirrors `ModelLifecycle`'s interface.
struct RealClient {
    client: LemonadeLegendsClient,
    transport: Arc<ScriptedTransport>,
}

impl RealClient {
    fn new() -> Self {
        let factory = ScriptedFactory::new(Arc::new(ScriptedTransport::new()));
        let options = ClientOptions { private_key: Some(KEY.to_string()), ..Default::default() };
        let client = LemonadeLegendsClient::with_environment(
            options,
            &EnvConfig::default(),
            &factory,
            SystemEnv::new(),
        );
        Self { client, transport: Arc::clone(factory.transport()) }
    }

    /// Script the transport for `op`, then run it.
    async fn apply(&self, op: Operation, open_fails: Option<bool>) -> OperationOutcome {
        if open_fails == Some(true) {
            self.transport.push_open(OpenStep::Fail(TransportError::connection("scripted")));
        }

        let result = match op {
            Operation::Connect { .. } => self.client.connect().await,
            Operation::Call { .. } => {
                self.transport.push_request(RequestStep::Respond(ToolResult::structured(
                    json!({ "pubkeys": [] }),
                )));
                self.client.stats(Map::new()).await.map(|_| ())
            },
            Operation::Disconnect => {
                self.client.disconnect().await;
                Ok(())
            },
        };

        match result {
            Ok(()) => OperationOutcome::Ok,
            Err(ClientError::Closed) => OperationOutcome::Closed,
            Err(ClientError::Transport(TransportError::Connection { .. })) => {
                OperationOutcome::ConnectFailed
            },
            Err(e) => panic!("unexpected error from {op:?}: {e}"),
        }
    }

    fn observable(&self) -> ObservableState {
        let state = match self.client.state() {
            ConnectionState::Disconnected => ModelState::Disconnected,
            ConnectionState::Connected => ModelState::Connected,
            ConnectionState::Closed => ModelState::Closed,
            ConnectionState::Connecting => panic!("operation left the client connecting"),
        };

        ObservableState {
            state,
            opens: self.transport.opens(),
            closes: self.transport.closes(),
            requests: self.transport.requests().len(),
        }
    }
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => any::<bool>().prop_map(|open_fails| Operation::Connect { open_fails }),
        4 => any::<bool>().prop_map(|open_fails| Operation::Call { open_fails }),
        1 => Just(Operation::Disconnect),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build().unwrap()
}

proptest! {
    /// Verify that outcomes and observable state match between model and
    /// real client after every operation.
    #[test]
    fn prop_model_matches_real(ops in prop::collection::vec(operation_strategy(), 0..40)) {
        let rt = runtime();
        let real = RealClient::new();
        let mut model = ModelLifecycle::new();

        for (i, op) in ops.iter().enumerate() {
            let open_fails = model.scripted_open(*op);
            let model_outcome = model.apply(*op);
            let real_outcome = rt.block_on(real.apply(*op, open_fails));

            prop_assert_eq!(
                model_outcome,
                real_outcome,
                "Divergence at operation {}: {:?}",
                i, op
            );
            prop_assert_eq!(model.observable(), real.observable());
        }
    }

    /// Verify that once closed, no operation opens the transport again.
    #[test]
    fn prop_closed_is_terminal(
        before in prop::collection::vec(operation_strategy(), 0..10),
        after in prop::collection::vec(operation_strategy(), 1..10)
    ) {
        let mut model = ModelLifecycle::new();
        for op in before {
            model.apply(op);
        }
        model.apply(Operation::Disconnect);
        let opens = model.observable().opens;

        for op in after {
            let outcome = model.apply(op);
            if op != Operation::Disconnect {
                prop_assert_eq!(outcome, OperationOutcome::Closed);
            }
        }

        prop_assert_eq!(model.observable().opens, opens);
        prop_assert_eq!(model.observable().closes, 1);
        prop_assert_eq!(model.observable().state, ModelState::Closed);
    }
}
