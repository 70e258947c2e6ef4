//! Connection lifecycle state machine.
//!
//! `LifecycleClient` owns one transport and serializes its lifecycle without
//! holding a lock across I/O: each transition that needs I/O stores a shared
//! future, and concurrent callers await that same future instead of
//! starting their own attempt.
//!
//! ## States
//!
//! ```text
//!                 connect()             open ok
//!  Disconnected ───────────► Connecting ────────► Connected
//!       ▲                        │
//!       └────── open failed ─────┘
//!
//!  any state ── disconnect() ──► Closed   (terminal)
//! ```
//!
//! # Invariants
//!
//! - At most one open attempt is in flight; every waiter sees its outcome
//! - A failed attempt is forgotten, the next `connect` opens again
//! - `Closed` is set before `close` runs and is never left
//! - At most one `close` ever runs; `disconnect` never fails

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use lemonade_transport::{
    Environment, ProgressSink, RequestOptions, ToolCall, ToolResult, Transport, TransportError,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    config::{ClientInfo, RequestConfig},
    error::ClientError,
};

/// Connection state of a [`LifecycleClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected; `connect` will open the transport.
    Disconnected,
    /// An open attempt is in flight.
    Connecting,
    /// The transport is open.
    Connected,
    /// `disconnect` was called. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

type ConnectFuture = Shared<BoxFuture<'static, Result<(), TransportError>>>;
type CloseFuture = Shared<BoxFuture<'static, ()>>;

/// Mutable lifecycle record. Only touched under the mutex, never across an
/// `.await`.
struct Lifecycle {
    state: ConnectionState,
    /// Present exactly while `state == Connecting`.
    connecting: Option<ConnectFuture>,
    /// Present once `disconnect` has been called.
    closing: Option<CloseFuture>,
    /// Incremented per open attempt so a stale attempt cannot overwrite
    /// newer state.
    attempt: u64,
}

struct Inner<E: Environment> {
    info: ClientInfo,
    transport: Arc<dyn Transport>,
    request: RequestConfig,
    env: E,
    lifecycle: Mutex<Lifecycle>,
}

impl<E: Environment> Inner<E> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // The record is always left consistent, so a poisoned lock is usable.
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the outcome of open attempt `attempt`.
    fn finish_connect(&self, attempt: u64, result: &Result<(), TransportError>) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.attempt != attempt || lifecycle.state != ConnectionState::Connecting {
            // Closed while opening. Closed wins.
            tracing::debug!(attempt, state = %lifecycle.state, "ignoring stale open result");
            return;
        }

        lifecycle.connecting = None;
        match result {
            Ok(()) => {
                lifecycle.state = ConnectionState::Connected;
                tracing::debug!(attempt, client = %self.info.name, "connected");
            },
            Err(e) => {
                lifecycle.state = ConnectionState::Disconnected;
                tracing::debug!(attempt, "connect failed: {}", e);
            },
        }
    }
}

/// Client owning a transport and its connection lifecycle.
///
/// Cheap to clone; clones share the same transport and state.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time
pub struct LifecycleClient<E: Environment> {
    inner: Arc<Inner<E>>,
}

impl<E: Environment> Clone for LifecycleClient<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E: Environment> fmt::Debug for LifecycleClient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleClient")
            .field("info", &self.inner.info)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> LifecycleClient<E> {
    /// Create a disconnected client over `transport`. Performs no I/O.
    pub fn new(
        transport: Arc<dyn Transport>,
        info: ClientInfo,
        request: RequestConfig,
        env: E,
    ) -> Self {
        let lifecycle = Lifecycle {
            state: ConnectionState::Disconnected,
            connecting: None,
            closing: None,
            attempt: 0,
        };

        Self {
            inner: Arc::new(Inner {
                info,
                transport,
                request,
                env,
                lifecycle: Mutex::new(lifecycle),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle().state
    }

    /// Name and version of this client.
    pub fn info(&self) -> &ClientInfo {
        &self.inner.info
    }

    /// Ensure the transport is open.
    ///
    /// Returns immediately when connected. Joins the in-flight attempt when
    /// one exists, otherwise starts one. Fails fast with
    /// [`ClientError::Closed`] once `disconnect` has been called.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let pending = {
            let mut lifecycle = self.inner.lifecycle();
            match lifecycle.state {
                ConnectionState::Closed => return Err(ClientError::Closed),
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Disconnected => {},
            }

            match lifecycle.connecting.clone() {
                Some(pending) => pending,
                None => self.start_connect(&mut lifecycle),
            }
        };

        pending.await.map_err(ClientError::from)
    }

    fn start_connect(&self, lifecycle: &mut Lifecycle) -> ConnectFuture {
        lifecycle.attempt += 1;
        let attempt = lifecycle.attempt;

        let transport = Arc::clone(&self.inner.transport);
        let inner: Weak<Inner<E>> = Arc::downgrade(&self.inner);
        let pending = async move {
            let result = transport.open().await;
            if let Some(inner) = inner.upgrade() {
                inner.finish_connect(attempt, &result);
            }
            result
        }
        .boxed()
        .shared();

        lifecycle.state = ConnectionState::Connecting;
        lifecycle.connecting = Some(pending.clone());
        tracing::debug!(attempt, "connecting");

        pending
    }

    /// Close the client for good.
    ///
    /// The client is `Closed` as soon as this is called, before the transport
    /// finishes closing. Concurrent calls share one close; later calls return
    /// at once. Close failures are logged and swallowed.
    pub async fn disconnect(&self) {
        let pending = {
            let mut lifecycle = self.inner.lifecycle();
            if let Some(pending) = lifecycle.closing.clone() {
                pending
            } else {
                let previous = lifecycle.state;
                lifecycle.state = ConnectionState::Closed;
                lifecycle.connecting = None;

                let transport = Arc::clone(&self.inner.transport);
                let pending = async move {
                    if let Err(e) = transport.close().await {
                        tracing::warn!("transport close failed, client stays closed: {}", e);
                    }
                }
                .boxed()
                .shared();

                lifecycle.closing = Some(pending.clone());
                tracing::debug!(%previous, "closing");
                pending
            }
        };

        pending.await;
    }

    /// Connect in a background task, logging a failure instead of returning
    /// it.
    pub fn connect_in_background(&self) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.connect().await {
                tracing::warn!("failed to connect to server: {}", e);
            }
        })
    }

    /// Call the remote operation `name` and decode its structured result.
    ///
    /// Connects first and fails with [`ClientError::Closed`] if the client
    /// was disconnected meanwhile. No retries: connection errors, remote failures and
    /// timeouts reach the caller unchanged.
    pub async fn call<T: DeserializeOwned>(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<T, ClientError> {
        self.connect().await?;
        // A disconnect during the open leaves the transport closing.
        if self.state() == ConnectionState::Closed {
            return Err(ClientError::Closed);
        }

        let result = self.dispatch(ToolCall::new(name, arguments)).await?;

        if result.is_error {
            return Err(ClientError::Remote { tool: name.to_string(), message: result.text() });
        }

        let structured = result.structured_content.ok_or_else(|| ClientError::InvalidResponse {
            tool: name.to_string(),
            reason: "missing structured content".to_string(),
        })?;

        serde_json::from_value(structured).map_err(|e| ClientError::InvalidResponse {
            tool: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send `call` and wait for the response, restarting the timeout on
    /// progress when configured.
    async fn dispatch(&self, call: ToolCall) -> Result<ToolResult, ClientError> {
        let config = self.inner.request;
        let env = &self.inner.env;
        let tool = call.name.clone();

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let options = RequestOptions {
            progress: Some(ProgressSink::new(progress_tx)),
            timeout: config.timeout,
            reset_timeout_on_progress: config.reset_timeout_on_progress,
            max_total_timeout: config.max_total_timeout,
            pmis: Vec::new(),
        };

        tracing::debug!(tool = %tool, "dispatching request");

        let started = env.now();
        let mut clock_start = started;
        let mut request = self.inner.transport.send_request(call, options);

        loop {
            let mut remaining = config.timeout.saturating_sub(env.now() - clock_start);
            if let Some(max_total) = config.max_total_timeout {
                remaining = remaining.min(max_total.saturating_sub(env.now() - started));
            }

            tokio::select! {
                result = &mut request => return result.map_err(ClientError::from),
                Some(progress) = progress_rx.recv() => {
                    tracing::trace!(
                        tool = %tool,
                        progress = progress.progress,
                        total = ?progress.total,
                        "progress"
                    );
                    if config.reset_timeout_on_progress {
                        clock_start = env.now();
                    }
                },
                () = env.sleep(remaining) => {
                    let after = env.now() - started;
                    tracing::warn!(tool = %tool, ?after, "request timed out");
                    return Err(ClientError::Timeout { tool, after });
                },
            }
        }
    }
}
