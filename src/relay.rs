//! Relay orchestration: one received signal in, one Meta delivery out.
//!
//! Mirrors the full event cycle the delivery log records: resolve the
//! container's token, resolve the event_source_url, build the payload,
//! stamp a de-dup key, deliver, and close the cycle with a duration.
//! Delivery is at-most-once — a failed attempt is logged and reported to
//! the caller, never retried.

use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::capi::{build_capi_event, canonicalize_source_url, EventName, EventsResponse, UserSignal};
use crate::graph::DeliverError;
use crate::AppContext;

/// Why a relay attempt was refused or failed. Maps 1:1 onto the HTTP
/// statuses the original API returns.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("GTM Container ID is required")]
    MissingContainerId,
    #[error("No Facebook token found for this GTM Container ID")]
    TokenNotFound,
    #[error("Token is inactive. Please activate the token to send events.")]
    TokenInactive,
    #[error("Meta event error")]
    Deliver(#[from] DeliverError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Relay one event. Every attempt, refused or not, leaves a `complete`
/// record in the delivery log.
pub async fn relay_event(
    ctx: &AppContext,
    name: EventName,
    mut signal: UserSignal,
) -> Result<EventsResponse, RelayError> {
    let started = Instant::now();
    let event_name = name.as_str();

    let container = match signal
        .gtm_container_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(container) => container.to_string(),
        None => {
            ctx.delivery_log.received(event_name, "").await;
            ctx.delivery_log
                .complete(event_name, "", elapsed_ms(started), false)
                .await;
            return Err(RelayError::MissingContainerId);
        }
    };

    ctx.delivery_log.received(event_name, &container).await;

    let token = match ctx.storage.get_token_by_container(&container).await? {
        Some(token) => token,
        None => {
            ctx.delivery_log
                .complete(event_name, &container, elapsed_ms(started), false)
                .await;
            return Err(RelayError::TokenNotFound);
        }
    };
    if !token.is_active {
        ctx.delivery_log
            .complete(event_name, &container, elapsed_ms(started), false)
            .await;
        return Err(RelayError::TokenInactive);
    }

    signal.event_source_url = Some(resolve_source_url(ctx, &container, &signal).await);

    let event_time = Utc::now().timestamp();
    let mut event = build_capi_event(name, &signal, event_time);
    if event.event_id.is_none() {
        // Stamp a de-dup key so rapid duplicate triggers stay distinguishable.
        event.event_id = Some(Uuid::new_v4().to_string());
    }

    ctx.delivery_log
        .sent(event_name, &container, &token.dataset_id, &token.access_token)
        .await;

    match ctx
        .sink
        .deliver(&token.access_token, &token.dataset_id, &event)
        .await
    {
        Ok(response) => {
            ctx.delivery_log
                .success(
                    event_name,
                    &container,
                    serde_json::to_value(&response).unwrap_or_default(),
                )
                .await;
            ctx.delivery_log
                .complete(event_name, &container, elapsed_ms(started), true)
                .await;
            if let Err(e) = ctx.storage.touch_token_last_used(&token.id).await {
                tracing::warn!(err = %e, "failed to update token last_used");
            }
            Ok(response)
        }
        Err(e) => {
            ctx.delivery_log
                .error(event_name, &container, &e.to_string())
                .await;
            ctx.delivery_log
                .complete(event_name, &container, elapsed_ms(started), false)
                .await;
            Err(e.into())
        }
    }
}

/// The signal's page URL wins; a verified domain for the container is the
/// fallback, then the configured default. Always canonicalized.
async fn resolve_source_url(ctx: &AppContext, container: &str, signal: &UserSignal) -> String {
    if let Some(url) = signal
        .event_source_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        return canonicalize_source_url(url);
    }

    match ctx.storage.find_verified_by_container(container).await {
        Ok(Some(verification)) => {
            let domain = verification.domain_name;
            let url = if domain.starts_with("http://") || domain.starts_with("https://") {
                domain
            } else {
                format!("https://{domain}")
            };
            canonicalize_source_url(&url)
        }
        Ok(None) => ctx.config.meta.source_url_fallback.clone(),
        Err(e) => {
            tracing::warn!(err = %e, "verified domain lookup failed");
            ctx.config.meta.source_url_fallback.clone()
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
