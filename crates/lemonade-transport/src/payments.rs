//! Client-side payment capture.
//!
//! When a server answers a request with `payment_required`, the
//! [`PaymentCapture`] decorator hands the request to the first matching
//! [`PaymentHandler`] and then surfaces the original error to the caller.
//! Nothing in this module pays an invoice.
//!
//! ## Flow
//!
//! ```text
//! send_request ──► inner transport ──► Ok(result) ─────────────► caller
//!                        │
//!                        └─► Err(PaymentRequired(req))
//!                                 ├─► handler.handle(req) ─► sink (latest wins)
//!                                 └─► Err(PaymentRequired(req)) ─► caller
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    env::Environment,
    error::TransportError,
    message::{RequestOptions, ToolCall, ToolResult},
    transport::Transport,
};

/// Lightning BOLT11 payment method identifier.
pub const UI_ONLY_PMI: &str = "bitcoin-lightning-bolt11";

/// Payment demanded by the server for a prior request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Id of the request event that triggered the demand.
    pub request_event_id: String,
    /// Amount in sats.
    pub amount: u64,
    /// Payment request string (e.g. a BOLT11 invoice).
    pub pay_req: String,
    /// Optional human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Payment method the server expects, if it named one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmi: Option<String>,
}

/// Status of a recorded payment notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The server is waiting for payment.
    PaymentRequired,
}

/// Payment demand as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotice {
    /// Always [`PaymentStatus::PaymentRequired`].
    pub status: PaymentStatus,
    /// Id of the request event that triggered the demand.
    pub request_event_id: String,
    /// Amount in sats.
    pub amount: u64,
    /// Payment request string to render (QR / copy).
    pub pay_req: String,
    /// Optional human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the demand was observed, in Unix milliseconds.
    pub timestamp: u64,
}

impl PaymentNotice {
    /// Build a notice for `request` observed at `timestamp`.
    pub fn payment_required(request: &PaymentRequest, timestamp: u64) -> Self {
        Self {
            status: PaymentStatus::PaymentRequired,
            request_event_id: request.request_event_id.clone(),
            amount: request.amount,
            pay_req: request.pay_req.clone(),
            description: request.description.clone(),
            timestamp,
        }
    }
}

/// Receives payment notices. Fire-and-forget.
pub trait PaymentSink: Send + Sync {
    /// Record a `payment_required` notice.
    fn record_payment_required(&self, notice: PaymentNotice);
}

/// Reacts to `payment_required` signals.
#[async_trait]
pub trait PaymentHandler: Send + Sync {
    /// Payment method identifier advertised to servers.
    fn pmi(&self) -> &str;

    /// Whether this handler wants `request`.
    fn can_handle(&self, _request: &PaymentRequest) -> bool {
        true
    }

    /// Handle a payment demand.
    async fn handle(&self, request: &PaymentRequest) -> Result<(), TransportError>;
}

/// Latest payment notice, observable by a UI.
///
/// Holds at most one notice; recording a new one replaces the old one.
#[derive(Debug)]
pub struct PaymentUiStore {
    state: watch::Sender<Option<PaymentNotice>>,
}

impl PaymentUiStore {
    /// Empty store.
    pub fn new() -> Self {
        Self { state: watch::Sender::new(None) }
    }

    /// The latest notice, if any.
    pub fn latest(&self) -> Option<PaymentNotice> {
        self.state.borrow().clone()
    }

    /// Forget the current notice.
    pub fn reset(&self) {
        self.state.send_replace(None);
    }

    /// Watch for changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<PaymentNotice>> {
        self.state.subscribe()
    }
}

impl Default for PaymentUiStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentSink for PaymentUiStore {
    fn record_payment_required(&self, notice: PaymentNotice) {
        self.state.send_replace(Some(notice));
    }
}

/// Handler that only surfaces the invoice.
///
/// Advertises [`UI_ONLY_PMI`], accepts every demand, stamps it with the
/// environment's wall clock and records it in the sink.
pub struct UiOnlyPaymentHandler<E: Environment> {
    sink: Arc<dyn PaymentSink>,
    env: E,
}

impl<E: Environment> UiOnlyPaymentHandler<E> {
    /// Create a handler recording into `sink`.
    pub fn new(sink: Arc<dyn PaymentSink>, env: E) -> Self {
        Self { sink, env }
    }
}

#[async_trait]
impl<E: Environment> PaymentHandler for UiOnlyPaymentHandler<E> {
    fn pmi(&self) -> &str {
        UI_ONLY_PMI
    }

    async fn handle(&self, request: &PaymentRequest) -> Result<(), TransportError> {
        let notice = PaymentNotice::payment_required(request, self.env.unix_millis());
        tracing::info!(
            request_event_id = %notice.request_event_id,
            amount = notice.amount,
            "payment required"
        );
        self.sink.record_payment_required(notice);
        Ok(())
    }
}

/// Transport decorator capturing `payment_required` signals.
pub struct PaymentCapture<T> {
    inner: T,
    handlers: Vec<Arc<dyn PaymentHandler>>,
}

impl<T: Transport> PaymentCapture<T> {
    /// Wrap `inner`, routing payment demands to `handlers` in order.
    pub fn new(inner: T, handlers: Vec<Arc<dyn PaymentHandler>>) -> Self {
        Self { inner, handlers }
    }

    /// Payment method identifiers of all handlers, without duplicates.
    pub fn pmis(&self) -> Vec<String> {
        let mut pmis: Vec<String> = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            if !pmis.iter().any(|p| p == handler.pmi()) {
                pmis.push(handler.pmi().to_string());
            }
        }
        pmis
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn select_handler(&self, request: &PaymentRequest) -> Option<&Arc<dyn PaymentHandler>> {
        self.handlers.iter().find(|handler| {
            request.pmi.as_deref().is_none_or(|pmi| pmi == handler.pmi())
                && handler.can_handle(request)
        })
    }

    async fn dispatch_payment(&self, request: &PaymentRequest) {
        let Some(handler) = self.select_handler(request) else {
            tracing::debug!(
                request_event_id = %request.request_event_id,
                pmi = ?request.pmi,
                "no payment handler accepts request"
            );
            return;
        };

        if let Err(e) = handler.handle(request).await {
            tracing::warn!(
                request_event_id = %request.request_event_id,
                pmi = handler.pmi(),
                "payment handler failed: {}",
                e
            );
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for PaymentCapture<T> {
    async fn open(&self) -> Result<(), TransportError> {
        self.inner.open().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }

    async fn send_request(
        &self,
        call: ToolCall,
        mut options: RequestOptions,
    ) -> Result<ToolResult, TransportError> {
        for pmi in self.pmis() {
            if !options.pmis.contains(&pmi) {
                options.pmis.push(pmi);
            }
        }

        match self.inner.send_request(call, options).await {
            Err(TransportError::PaymentRequired(request)) => {
                self.dispatch_payment(&request).await;
                Err(TransportError::PaymentRequired(request))
            },
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Map, json};

    use super::*;
    use crate::env::SystemEnv;

    /// Transport answering every request with a fixed outcome.
    struct FixedTransport {
        outcome: Result<ToolResult, TransportError>,
        seen_pmis: Mutex<Vec<String>>,
    }

    impl FixedTransport {
        fn new(outcome: Result<ToolResult, TransportError>) -> Self {
            Self { outcome, seen_pmis: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn open(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_request(
            &self,
            _call: ToolCall,
            options: RequestOptions,
        ) -> Result<ToolResult, TransportError> {
            self.seen_pmis.lock().unwrap().extend(options.pmis);
            self.outcome.clone()
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl PaymentHandler for FailingHandler {
        fn pmi(&self) -> &str {
            "test-pmi"
        }

        async fn handle(&self, _request: &PaymentRequest) -> Result<(), TransportError> {
            Err(TransportError::request("wallet offline"))
        }
    }

    fn demand(id: &str) -> PaymentRequest {
        PaymentRequest {
            request_event_id: id.to_string(),
            amount: 21,
            pay_req: "lnbc1...".to_string(),
            description: None,
            pmi: None,
        }
    }

    fn ui_capture(
        outcome: Result<ToolResult, TransportError>,
    ) -> (PaymentCapture<FixedTransport>, Arc<PaymentUiStore>) {
        let store = Arc::new(PaymentUiStore::new());
        let handler: Arc<dyn PaymentHandler> =
            Arc::new(UiOnlyPaymentHandler::new(store.clone(), SystemEnv::new()));
        (PaymentCapture::new(FixedTransport::new(outcome), vec![handler]), store)
    }

    #[tokio::test]
    async fn payment_required_is_recorded_and_reraised() {
        let (capture, store) = ui_capture(Err(TransportError::PaymentRequired(demand("r1"))));

        let call = ToolCall::new("mint_badge", Map::new());
        let result = capture.send_request(call, RequestOptions::default()).await;

        assert_eq!(result, Err(TransportError::PaymentRequired(demand("r1"))));
        let notice = store.latest().unwrap();
        assert_eq!(notice.status, PaymentStatus::PaymentRequired);
        assert_eq!(notice.request_event_id, "r1");
        assert_eq!(notice.amount, 21);
        assert!(notice.timestamp > 0);
    }

    #[tokio::test]
    async fn normal_results_pass_through() {
        let expected = ToolResult::structured(json!({ "ok": true }));
        let (capture, store) = ui_capture(Ok(expected.clone()));

        let call = ToolCall::new("stats", Map::new());
        let result = capture.send_request(call, RequestOptions::default()).await;

        assert_eq!(result, Ok(expected));
        assert!(store.latest().is_none());
        assert_eq!(*capture.inner().seen_pmis.lock().unwrap(), vec![UI_ONLY_PMI.to_string()]);
    }

    #[tokio::test]
    async fn handler_failure_is_not_raised() {
        let capture = PaymentCapture::new(
            FixedTransport::new(Err(TransportError::PaymentRequired(demand("r2")))),
            vec![Arc::new(FailingHandler) as Arc<dyn PaymentHandler>],
        );

        let call = ToolCall::new("mint_badge", Map::new());
        let result = capture.send_request(call, RequestOptions::default()).await;

        assert_eq!(result, Err(TransportError::PaymentRequired(demand("r2"))));
    }

    #[tokio::test]
    async fn handler_with_other_pmi_is_skipped() {
        let (capture, store) = ui_capture(Err(TransportError::PaymentRequired(PaymentRequest {
            pmi: Some("cashu".to_string()),
            ..demand("r3")
        })));

        let call = ToolCall::new("mint_badge", Map::new());
        let _ = capture.send_request(call, RequestOptions::default()).await;

        assert!(store.latest().is_none());
    }

    #[test]
    fn store_keeps_only_latest() {
        let store = PaymentUiStore::new();
        store.record_payment_required(PaymentNotice::payment_required(&demand("old"), 1));
        store.record_payment_required(PaymentNotice::payment_required(&demand("new"), 2));

        assert_eq!(store.latest().unwrap().request_event_id, "new");

        store.reset();
        assert!(store.latest().is_none());
    }

    #[test]
    fn subscribers_see_recorded_notice() {
        let store = PaymentUiStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.record_payment_required(PaymentNotice::payment_required(&demand("r9"), 5));

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.request_event_id, "r9");
        assert_eq!(seen.timestamp, 5);

        store.reset();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn notice_serializes_status_tag() {
        let notice = PaymentNotice::payment_required(&demand("r1"), 7);
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["status"], "payment_required");
        assert_eq!(value["timestamp"], 7);
    }
}
