// rest/mod.rs — REST API server.
//
// Axum HTTP server, local only by default (bind 127.0.0.1). CORS is wide
// open because the relay endpoints are called from arbitrary visitor
// browsers via the generated GTM scripts.
//
// Endpoints (all under /api/v1):
//   GET  /health
//   POST /events/{event}                       (relay, kebab-case event name)
//   GET  /token-info/{gtm_container_id}        (consumed by generated scripts)
//   GET  /tokens          POST /tokens
//   GET  /tokens/{id}     DELETE /tokens/{id}
//   POST /tokens/{id}/toggle
//   GET  /tokens/{id}/script
//   GET  /verifications   POST /verifications
//   PUT  /verifications/{id}   DELETE /verifications/{id}
//   POST /verifications/{id}/verify
//   GET  /verifications/{id}/script
//   GET  /logs/events     GET /logs/events/stats
//   GET  /logs/events/download   POST /logs/events/clear

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health
        .route("/api/v1/health", get(routes::health::health))
        // Event relay
        .route("/api/v1/events/{event}", post(routes::events::relay))
        // Token registry
        .route(
            "/api/v1/tokens",
            get(routes::tokens::list_tokens).post(routes::tokens::create_token),
        )
        .route(
            "/api/v1/tokens/{id}",
            get(routes::tokens::get_token).delete(routes::tokens::delete_token),
        )
        .route("/api/v1/tokens/{id}/toggle", post(routes::tokens::toggle_token))
        .route("/api/v1/tokens/{id}/script", get(routes::tokens::get_token_script))
        .route(
            "/api/v1/token-info/{gtm_container_id}",
            get(routes::tokens::get_token_info),
        )
        // Domain verification
        .route(
            "/api/v1/verifications",
            get(routes::verifications::list_verifications)
                .post(routes::verifications::create_verification),
        )
        .route(
            "/api/v1/verifications/{id}",
            put(routes::verifications::update_verification)
                .delete(routes::verifications::delete_verification),
        )
        .route(
            "/api/v1/verifications/{id}/verify",
            post(routes::verifications::verify_verification),
        )
        .route(
            "/api/v1/verifications/{id}/script",
            get(routes::verifications::get_verification_script),
        )
        // Delivery log
        .route("/api/v1/logs/events", get(routes::logs::get_events))
        .route("/api/v1/logs/events/stats", get(routes::logs::get_stats))
        .route("/api/v1/logs/events/download", get(routes::logs::download))
        .route("/api/v1/logs/events/clear", post(routes::logs::clear))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
