// rest/routes/logs.rs — delivery log surface: query, stats, download,
// clear.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::eventlog::LogQuery;
use crate::rest::error::ApiError;
use crate::AppContext;

/// `GET /api/v1/logs/events?limit=&level=&event=&container=`
pub async fn get_events(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Value>, ApiError> {
    let logs = ctx.delivery_log.query(&query).await?;
    let total = logs.len();
    Ok(Json(json!({
        "logs": logs,
        "total": total,
        "message": format!("Retrieved {total} log entries"),
    })))
}

pub async fn get_stats(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    let stats = ctx.delivery_log.stats().await?;
    Ok(Json(serde_json::to_value(stats).map_err(anyhow::Error::from)?))
}

/// Stream the raw log file back as an attachment.
pub async fn download(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ApiError> {
    let contents = match tokio::fs::read(ctx.delivery_log.path()).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("Log file not found".to_string()))
        }
        Err(e) => return Err(ApiError::Internal(e.into())),
    };

    let filename = format!("gtm_events_{}.log", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        contents,
    ))
}

pub async fn clear(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    ctx.delivery_log.clear().await?;
    Ok(Json(json!({ "message": "Logs cleared successfully" })))
}
