// rest/routes/events.rs — the relay endpoint the generated GTM scripts
// (and server-side callers) POST signals to.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capi::{EventName, UserSignal};
use crate::relay;
use crate::rest::error::ApiError;
use crate::AppContext;

/// `POST /api/v1/events/{event}` — event names are kebab-case
/// (`purchase`, `add-to-cart`, `page-view`, …).
pub async fn relay(
    State(ctx): State<Arc<AppContext>>,
    Path(event): Path<String>,
    Json(signal): Json<UserSignal>,
) -> Result<Json<Value>, ApiError> {
    let name = EventName::from_route(&event)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown event: {event}")))?;

    let response = relay::relay_event(&ctx, name, signal).await?;
    Ok(Json(json!({
        "msg": "Event sent to Meta",
        "meta_response": response,
    })))
}
