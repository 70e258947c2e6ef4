//! Scripted transport.
//!
//! Every `open` and `send_request` consumes the next scripted step; once a
//! script runs dry, `open` succeeds and requests answer with an empty
//! structured object. Calls are counted and recorded for assertions.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use lemonade_transport::{
    BaseTransportParams, Progress, RequestOptions, ToolCall, ToolResult, Transport,
    TransportError, TransportFactory,
};
use serde_json::json;

/// Outcome of one `open`.
#[derive(Debug, Clone)]
pub enum OpenStep {
    /// Open succeeds.
    Succeed,
    /// Open fails with the given error.
    Fail(TransportError),
}

/// Behaviour of one `send_request`.
#[derive(Debug, Clone)]
pub enum RequestStep {
    /// Answer with a result.
    Respond(ToolResult),
    /// Fail with an error.
    Fail(TransportError),
    /// Emit `updates` progress notifications `interval` apart, then answer.
    ProgressThenRespond {
        /// Number of progress notifications.
        updates: usize,
        /// Delay before each notification and before the answer.
        interval: Duration,
        /// Final result.
        result: ToolResult,
    },
    /// Never answer.
    Hang,
}

/// Transport driven by scripted steps.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    open_steps: Mutex<VecDeque<OpenStep>>,
    request_steps: Mutex<VecDeque<RequestStep>>,
    open_delay: Duration,
    close_delay: Duration,
    close_error: Option<TransportError>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    requests: Mutex<Vec<(ToolCall, RequestOptions)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    /// Transport with empty scripts and no delays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `open` by `delay`.
    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Delay every `close` by `delay`.
    #[must_use]
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Make every `close` fail with `error`.
    #[must_use]
    pub fn with_close_error(mut self, error: TransportError) -> Self {
        self.close_error = Some(error);
        self
    }

    /// Queue the outcome of a future `open`.
    pub fn push_open(&self, step: OpenStep) {
        lock(&self.open_steps).push_back(step);
    }

    /// Queue the behaviour of a future `send_request`.
    pub fn push_request(&self, step: RequestStep) {
        lock(&self.request_steps).push_back(step);
    }

    /// Number of `open` invocations.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `close` invocations.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Requests received so far, with their options (progress sink removed).
    pub fn requests(&self) -> Vec<(ToolCall, RequestOptions)> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self) -> Result<(), TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let step = lock(&self.open_steps).pop_front().unwrap_or(OpenStep::Succeed);

        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        match step {
            OpenStep::Succeed => Ok(()),
            OpenStep::Fail(e) => Err(e),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);

        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }

        self.close_error.clone().map_or(Ok(()), Err)
    }

    async fn send_request(
        &self,
        call: ToolCall,
        options: RequestOptions,
    ) -> Result<ToolResult, TransportError> {
        let progress = options.progress.clone();
        lock(&self.requests).push((call, RequestOptions { progress: None, ..options }));

        let step = lock(&self.request_steps)
            .pop_front()
            .unwrap_or_else(|| RequestStep::Respond(ToolResult::structured(json!({}))));

        match step {
            RequestStep::Respond(result) => Ok(result),
            RequestStep::Fail(e) => Err(e),
            RequestStep::ProgressThenRespond { updates, interval, result } => {
                for n in 0..updates {
                    tokio::time::sleep(interval).await;
                    if let Some(sink) = &progress {
                        #[allow(clippy::cast_precision_loss)]
                        let update = Progress {
                            progress: (n + 1) as f64,
                            total: Some(updates as f64),
                            message: None,
                        };
                        sink.notify(update);
                    }
                }
                tokio::time::sleep(interval).await;
                Ok(result)
            },
            RequestStep::Hang => std::future::pending().await,
        }
    }
}

/// Factory handing out one shared [`ScriptedTransport`].
///
/// Remembers the parameters of the last build so tests can inspect how the
/// configuration was resolved.
#[derive(Debug)]
pub struct ScriptedFactory {
    transport: Arc<ScriptedTransport>,
    last_params: Mutex<Option<BaseTransportParams>>,
}

impl ScriptedFactory {
    /// Factory building `transport`.
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self { transport, last_params: Mutex::new(None) }
    }

    /// The transport handed out by [`TransportFactory::build`].
    pub fn transport(&self) -> &Arc<ScriptedTransport> {
        &self.transport
    }

    /// Parameters of the last build.
    pub fn last_params(&self) -> Option<BaseTransportParams> {
        lock(&self.last_params).clone()
    }
}

impl TransportFactory for ScriptedFactory {
    fn build(&self, params: BaseTransportParams) -> Arc<dyn Transport> {
        *lock(&self.last_params) = Some(params);
        Arc::clone(&self.transport) as Arc<dyn Transport>
    }
}
