//! Graph API dispatch.
//!
//! [`GraphClient`] posts one event per request to Meta's
//! `/{pixel_id}/events` endpoint. Delivery is best-effort and
//! at-most-once: a non-2xx response or transport error is terminal for
//! that event — logged by the caller, never retried.
//!
//! The [`EventSink`] trait is the seam between the relay and the network:
//! production wires in `GraphClient`, tests inject a recording stub.

use async_trait::async_trait;

use crate::capi::{CapiEvent, EventsEnvelope, EventsResponse};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v18.0";

/// Errors terminal for a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliverError {
    #[error("Facebook API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("Facebook API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Destination for built events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(
        &self,
        access_token: &str,
        pixel_id: &str,
        event: &CapiEvent,
    ) -> Result<EventsResponse, DeliverError>;
}

/// HTTP client for the Graph API events endpoint.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    /// `base_url` is the versioned Graph API root, without a trailing
    /// slash (tests point this at a local stub).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GraphClient {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPH_BASE_URL)
    }
}

#[async_trait]
impl EventSink for GraphClient {
    async fn deliver(
        &self,
        access_token: &str,
        pixel_id: &str,
        event: &CapiEvent,
    ) -> Result<EventsResponse, DeliverError> {
        let url = format!("{}/{}/events", self.base_url, pixel_id);
        let envelope = EventsEnvelope {
            data: [event],
            access_token,
        };

        let response = self.http.post(&url).json(&envelope).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliverError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<EventsResponse>().await?)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capi::{build_capi_event, EventName, UserSignal};
    use axum::{extract::Path, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    async fn spawn_stub(captured: Arc<Mutex<Vec<(String, Value)>>>) -> String {
        let app = Router::new().route(
            "/{pixel_id}/events",
            post(move |Path(pixel_id): Path<String>, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    captured.lock().await.push((pixel_id, body));
                    Json(json!({"events_received": 1, "fbtrace_id": "trace-1"}))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn posts_envelope_to_pixel_events_endpoint() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let base_url = spawn_stub(captured.clone()).await;

        let signal: UserSignal =
            serde_json::from_value(json!({"email": "a@b.com", "value": 10, "currency": "USD"}))
                .unwrap();
        let event = build_capi_event(EventName::Donate, &signal, 1_700_000_000);

        let client = GraphClient::new(&base_url);
        let response = client.deliver("tok-secret", "1234567890", &event).await.unwrap();
        assert_eq!(response.events_received, Some(1));
        assert_eq!(response.fbtrace_id.as_deref(), Some("trace-1"));

        let captured = captured.lock().await;
        let (pixel_id, body) = &captured[0];
        assert_eq!(pixel_id, "1234567890");
        assert_eq!(body["access_token"], "tok-secret");
        assert_eq!(body["data"][0]["event_name"], "Donate");
        assert_eq!(body["data"][0]["custom_data"]["value"], 10);
    }

    #[tokio::test]
    async fn non_2xx_is_a_status_error() {
        let app = Router::new().route(
            "/{pixel_id}/events",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"message": "Invalid parameter"}})),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = GraphClient::new(format!("http://{addr}"));
        let event = build_capi_event(EventName::PageView, &UserSignal::default(), 1_700_000_000);
        let err = client.deliver("tok", "42", &event).await.unwrap_err();
        match err {
            DeliverError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid parameter"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
