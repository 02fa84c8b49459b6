//! Integration tests for the event relay endpoints.
//! Spins up the REST server on a random port with a recording stub sink
//! in place of the real Graph API client.

use async_trait::async_trait;
use capifyd::{
    capi::{CapiEvent, EventsResponse},
    config::CapifyConfig,
    eventlog::DeliveryLog,
    graph::{DeliverError, EventSink},
    storage::Storage,
    AppContext,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

const SHA256_A_AT_B: &str = "fb98d44ad7501a959f3f4f4a3f004fe2d9e581ea6207e218c4b02c08a4d75adf";
const SHA256_PHONE: &str = "d6736136ea896c1bfdc553e0e86e702c70d060d805696ca3e4e9e0961353860a";

/// Records every delivery instead of talking to Meta.
struct StubSink {
    calls: Mutex<Vec<(String, String, CapiEvent)>>,
    fail: bool,
}

impl StubSink {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail,
        })
    }
}

#[async_trait]
impl EventSink for StubSink {
    async fn deliver(
        &self,
        access_token: &str,
        pixel_id: &str,
        event: &CapiEvent,
    ) -> Result<EventsResponse, DeliverError> {
        self.calls
            .lock()
            .await
            .push((access_token.to_string(), pixel_id.to_string(), event.clone()));
        if self.fail {
            return Err(DeliverError::Status {
                status: 400,
                body: "{\"error\":{\"message\":\"Invalid parameter\"}}".to_string(),
            });
        }
        Ok(serde_json::from_value(json!({"events_received": 1, "fbtrace_id": "trace-1"})).unwrap())
    }
}

async fn make_test_ctx(dir: &TempDir, sink: Arc<dyn EventSink>) -> Arc<AppContext> {
    let data_dir = dir.path().to_path_buf();
    let config = CapifyConfig::new(None, Some(data_dir.clone()), Some("error".to_string()), None);
    let storage = Arc::new(Storage::new(&data_dir).await.unwrap());
    Arc::new(AppContext {
        config: Arc::new(config),
        storage,
        delivery_log: Arc::new(DeliveryLog::new(&data_dir)),
        sink,
        http: reqwest::Client::new(),
        started_at: std::time::Instant::now(),
    })
}

async fn spawn_server(ctx: Arc<AppContext>) -> String {
    let router = capifyd::rest::build_router(ctx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api/v1")
}

#[tokio::test]
async fn relays_add_to_cart_with_hashed_identity_fields() {
    let dir = tempfile::tempdir().unwrap();
    let sink = StubSink::new(false);
    let ctx = make_test_ctx(&dir, sink.clone()).await;
    ctx.storage
        .create_token("Token_1", "987654", None, "EAAB-relay-secret", "GTM-ABC1234")
        .await
        .unwrap();
    let base = spawn_server(ctx.clone()).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/events/add-to-cart"))
        .json(&json!({
            "gtm_container_id": "GTM-ABC1234",
            "email": "A@B.com",
            "phone": "+1 (555) 123-4567",
            "value": 10,
            "currency": "USD",
            "content_ids": ["p1"],
            "event_source_url": "https://shop.example.com/cart"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Event sent to Meta");
    assert_eq!(body["meta_response"]["events_received"], 1);

    let calls = sink.calls.lock().await;
    let (access_token, pixel_id, event) = &calls[0];
    assert_eq!(access_token, "EAAB-relay-secret");
    assert_eq!(pixel_id, "987654");
    assert_eq!(event.event_name, "AddToCart");
    assert_eq!(event.action_source, "website");
    assert_eq!(event.user_data.em, Some(vec![SHA256_A_AT_B.to_string()]));
    assert_eq!(event.user_data.ph, Some(vec![SHA256_PHONE.to_string()]));
    // The relay stamps a de-dup key when the signal carries none.
    assert!(event.event_id.is_some());
    assert_eq!(event.event_source_url, "https://www.shop.example.com/cart");
    assert_eq!(
        serde_json::to_value(&event.custom_data).unwrap(),
        json!({"value": 10, "currency": "USD", "content_ids": ["p1"]})
    );
    assert!(event.event_time > 1_700_000_000);
}

#[tokio::test]
async fn unknown_event_name_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = make_test_ctx(&dir, StubSink::new(false)).await;
    let base = spawn_server(ctx).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/events/no-such-event"))
        .json(&json!({"gtm_container_id": "GTM-ABC1234"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Unknown event: no-such-event");
}

#[tokio::test]
async fn missing_container_id_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = make_test_ctx(&dir, StubSink::new(false)).await;
    let base = spawn_server(ctx).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/events/purchase"))
        .json(&json!({"email": "a@b.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "GTM Container ID is required");
}

#[tokio::test]
async fn unregistered_container_is_404_and_inactive_token_is_403() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = make_test_ctx(&dir, StubSink::new(false)).await;
    let token = ctx
        .storage
        .create_token("Token_1", "111", None, "tok", "GTM-INACTIVE1")
        .await
        .unwrap();
    ctx.storage.set_token_active(&token.id, false).await.unwrap();
    let base = spawn_server(ctx).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/events/lead"))
        .json(&json!({"gtm_container_id": "GTM-UNKNOWN99"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("{base}/events/lead"))
        .json(&json!({"gtm_container_id": "GTM-INACTIVE1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert!(body["msg"].as_str().unwrap().contains("inactive"));
}

#[tokio::test]
async fn verified_domain_supplies_source_url_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let sink = StubSink::new(false);
    let ctx = make_test_ctx(&dir, sink.clone()).await;
    ctx.storage
        .create_token("Token_1", "222", None, "tok", "GTM-VERIFIED1")
        .await
        .unwrap();
    let verification = ctx
        .storage
        .create_verification("GTM-VERIFIED1", "shop.example.com", "CAPIFY_VERIFY_x")
        .await
        .unwrap();
    ctx.storage.mark_verified(&verification.id).await.unwrap();
    let base = spawn_server(ctx).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/events/page-view"))
        .json(&json!({"gtm_container_id": "GTM-VERIFIED1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let calls = sink.calls.lock().await;
    let (_, _, event) = &calls[0];
    assert_eq!(event.event_source_url, "https://www.shop.example.com/");
}

#[tokio::test]
async fn delivery_failure_is_500_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = make_test_ctx(&dir, StubSink::new(true)).await;
    ctx.storage
        .create_token("Token_1", "333", None, "tok", "GTM-FAILING11")
        .await
        .unwrap();
    let base = spawn_server(ctx).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/events/donate"))
        .json(&json!({"gtm_container_id": "GTM-FAILING11", "value": 5, "currency": "EUR"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "Meta event error");
    assert!(body["error"].as_str().unwrap().contains("400"));

    let logs: Value = client
        .get(format!("{base}/logs/events?level=ERROR"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // The failed cycle leaves an error record and a failed complete record.
    assert_eq!(logs["total"], 2);
}

#[tokio::test]
async fn relay_cycle_is_visible_through_log_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = make_test_ctx(&dir, StubSink::new(false)).await;
    ctx.storage
        .create_token("Token_1", "444", None, "EAAB-0123456789-abcdefghij-tail", "GTM-LOGGED123")
        .await
        .unwrap();
    let base = spawn_server(ctx).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/events/search"))
        .json(&json!({"gtm_container_id": "GTM-LOGGED123", "search_string": "red shoes"}))
        .send()
        .await
        .unwrap();

    let logs: Value = client
        .get(format!("{base}/logs/events?container=gtm-logged123"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs["total"], 4); // received, sent, success, complete
    let stages: Vec<&str> = logs["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["stage"].as_str().unwrap())
        .collect();
    for stage in ["received", "sent", "success", "complete"] {
        assert!(stages.contains(&stage), "missing stage {stage}");
    }
    // Access tokens are masked before they reach the log.
    let raw = serde_json::to_string(&logs).unwrap();
    assert!(!raw.contains("EAAB-0123456789-abcdefghij-tail"));

    let stats: Value = client
        .get(format!("{base}/logs/events/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_events"], 4);
    assert_eq!(stats["success_count"], 1);
    assert_eq!(stats["events_by_type"]["Search"], 4);

    let download = client
        .get(format!("{base}/logs/events/download"))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), 200);
    let disposition = download
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("gtm_events_"));
    assert_eq!(download.text().await.unwrap().lines().count(), 4);

    let cleared: Value = client
        .post(format!("{base}/logs/events/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["message"], "Logs cleared successfully");
    let logs: Value = client
        .get(format!("{base}/logs/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs["total"], 0);
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = make_test_ctx(&dir, StubSink::new(false)).await;
    let base = spawn_server(ctx).await;

    let body: Value = reqwest::Client::new()
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}
