//! Reference model of the connection lifecycle.
//!
//! Operations are applied one at a time, so the model never observes the
//! `Connecting` state; it captures which transport calls each operation
//! causes and what the caller sees.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Deterministic: Same inputs produce same outputs

use arbitrary::Arbitrary;

/// Lifecycle state as seen between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// No open transport; the next connect opens.
    Disconnected,
    /// Transport open.
    Connected,
    /// Disconnected for good.
    Closed,
}

/// Operation applied to both the model and the real client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// `connect()`; if it opens the transport, the open fails when
    /// `open_fails` is set.
    Connect {
        /// Script the open to fail.
        open_fails: bool,
    },
    /// `call("stats", {})`, connecting first.
    Call {
        /// Script the open to fail.
        open_fails: bool,
    },
    /// `disconnect()`.
    Disconnect,
}

/// What the caller of an operation observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Operation succeeded.
    Ok,
    /// Rejected because the client is closed.
    Closed,
    /// Rejected because opening the transport failed.
    ConnectFailed,
}

/// Observable state compared between model and real client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservableState {
    /// Lifecycle state.
    pub state: ModelState,
    /// Transport `open` invocations.
    pub opens: usize,
    /// Transport `close` invocations.
    pub closes: usize,
    /// Requests dispatched.
    pub requests: usize,
}

/// Reference lifecycle.
#[derive(Debug, Clone)]
pub struct ModelLifecycle {
    observable: ObservableState,
}

impl Default for ModelLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLifecycle {
    /// Fresh, disconnected model.
    pub fn new() -> Self {
        Self {
            observable: ObservableState {
                state: ModelState::Disconnected,
                opens: 0,
                closes: 0,
                requests: 0,
            },
        }
    }

    /// Current observable state.
    pub fn observable(&self) -> ObservableState {
        self.observable
    }

    /// If `op` will open the transport, whether that open should fail.
    pub fn scripted_open(&self, op: Operation) -> Option<bool> {
        match op {
            Operation::Connect { open_fails } | Operation::Call { open_fails }
                if self.observable.state == ModelState::Disconnected =>
            {
                Some(open_fails)
            },
            _ => None,
        }
    }

    /// Apply `op` and return what the caller observes.
    pub fn apply(&mut self, op: Operation) -> OperationOutcome {
        match op {
            Operation::Connect { open_fails } => self.connect(open_fails),
            Operation::Call { open_fails } => {
                let outcome = self.connect(open_fails);
                if outcome == OperationOutcome::Ok {
                    self.observable.requests += 1;
                }
                outcome
            },
            Operation::Disconnect => {
                if self.observable.state != ModelState::Closed {
                    self.observable.closes += 1;
                    self.observable.state = ModelState::Closed;
                }
                OperationOutcome::Ok
            },
        }
    }

    fn connect(&mut self, open_fails: bool) -> OperationOutcome {
        match self.observable.state {
            ModelState::Closed => OperationOutcome::Closed,
            ModelState::Connected => OperationOutcome::Ok,
            ModelState::Disconnected => {
                self.observable.opens += 1;
                if open_fails {
                    OperationOutcome::ConnectFailed
                } else {
                    self.observable.state = ModelState::Connected;
                    OperationOutcome::Ok
                }
            },
        }
    }
}
