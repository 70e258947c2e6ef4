//! Payment capture tests.

use std::sync::Arc;

use lemonade_client::{
    ClientError, ClientOptions, EnvConfig, LemonadeLegends, LemonadeLegendsClient, SystemEnv,
    TransportError,
};
use lemonade_harness::{RecordingSink, RequestStep, ScriptedFactory, ScriptedTransport};
use lemonade_transport::{
    PaymentCapture, PaymentHandler, PaymentRequest, PaymentStatus, RequestOptions, ToolCall,
    ToolResult, Transport, UI_ONLY_PMI, UiOnlyPaymentHandler,
};
use serde_json::{Map, json};

const KEY: &str = "0202020202020202020202020202020202020202020202020202020202020202";

fn invoice() -> PaymentRequest {
    PaymentRequest {
        request_event_id: "r1".to_string(),
        amount: 21,
        pay_req: "lnbc1...".to_string(),
        description: Some("lemonade badge".to_string()),
        pmi: Some(UI_ONLY_PMI.to_string()),
    }
}

fn client(payments_ui: bool) -> (LemonadeLegendsClient, Arc<ScriptedTransport>) {
    let factory = ScriptedFactory::new(Arc::new(ScriptedTransport::new()));
    let options = ClientOptions {
        private_key: Some(KEY.to_string()),
        enable_payments_ui: payments_ui,
        ..Default::default()
    };
    let client = LemonadeLegendsClient::with_environment(
        options,
        &EnvConfig::default(),
        &factory,
        SystemEnv::new(),
    );
    (client, Arc::clone(factory.transport()))
}

#[tokio::test]
async fn payment_required_is_recorded_and_call_rejects() {
    let (client, transport) = client(true);
    for _ in 0..2 {
        transport.push_request(RequestStep::Fail(TransportError::PaymentRequired(invoice())));
    }

    let first = client.mint_badge(Map::new()).await;
    let second = client.mint_badge(Map::new()).await;

    let expected = Err(ClientError::Transport(TransportError::PaymentRequired(invoice())));
    assert_eq!(first, expected);
    assert_eq!(second, expected);

    let notice = client.payments().unwrap().latest().unwrap();
    assert_eq!(notice.status, PaymentStatus::PaymentRequired);
    assert_eq!(notice.request_event_id, "r1");
    assert_eq!(notice.amount, 21);
    assert_eq!(notice.pay_req, "lnbc1...");
    assert!(notice.timestamp > 0);

    let serialized = serde_json::to_value(&notice).unwrap();
    assert_eq!(serialized["status"], json!("payment_required"));
}

#[tokio::test]
async fn payments_ui_advertises_pmi_and_leaves_results_alone() {
    let (client, transport) = client(true);
    transport.push_request(RequestStep::Respond(ToolResult::structured(json!({ "ok": true }))));

    let output = client.mint_badge(Map::new()).await.unwrap();

    assert_eq!(output.get("ok"), Some(&json!(true)));
    assert!(client.payments().unwrap().latest().is_none());
    assert_eq!(transport.requests()[0].1.pmis, [UI_ONLY_PMI]);
}

#[tokio::test]
async fn payments_disabled_sends_plain_requests() {
    let (client, transport) = client(false);

    let stats = client.stats(Map::new()).await.unwrap();

    assert_eq!(stats.pubkeys, None);
    assert!(client.payments().is_none());
    assert!(transport.requests()[0].1.pmis.is_empty());
}

#[tokio::test]
async fn capture_routes_to_sink() {
    let transport = ScriptedTransport::new();
    transport.push_request(RequestStep::Fail(TransportError::PaymentRequired(invoice())));
    let sink = Arc::new(RecordingSink::new());
    let handler: Arc<dyn PaymentHandler> =
        Arc::new(UiOnlyPaymentHandler::new(sink.clone(), SystemEnv::new()));
    let capture = PaymentCapture::new(transport, vec![handler]);

    let call = ToolCall::new("mint_badge", Map::new());
    let result = capture.send_request(call, RequestOptions::default()).await;

    assert_eq!(result, Err(TransportError::PaymentRequired(invoice())));
    let notices = sink.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].description.as_deref(), Some("lemonade badge"));
    assert_eq!(capture.inner().requests().len(), 1);
}

#[tokio::test]
async fn request_for_other_pmi_is_not_recorded() {
    let transport = ScriptedTransport::new();
    let other = PaymentRequest { pmi: Some("cashu".to_string()), ..invoice() };
    transport.push_request(RequestStep::Fail(TransportError::PaymentRequired(other.clone())));
    let sink = Arc::new(RecordingSink::new());
    let handler: Arc<dyn PaymentHandler> =
        Arc::new(UiOnlyPaymentHandler::new(sink.clone(), SystemEnv::new()));
    let capture = PaymentCapture::new(transport, vec![handler]);

    let call = ToolCall::new("mint_badge", Map::new());
    let result = capture.send_request(call, RequestOptions::default()).await;

    assert_eq!(result, Err(TransportError::PaymentRequired(other)));
    assert!(sink.notices().is_empty());
}
