// rest/routes/tokens.rs — Facebook token registry + the public
// token-info lookup consumed by generated browser scripts.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::rest::error::ApiError;
use crate::scripts;
use crate::AppContext;

pub async fn list_tokens(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, ApiError> {
    let tokens = ctx.storage.list_tokens().await?;
    Ok(Json(json!({ "tokens": tokens })))
}

pub async fn get_token(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match ctx.storage.get_token(&id).await? {
        Some(token) => Ok(Json(json!({ "token": token }))),
        None => Err(ApiError::NotFound("Token not found".to_string())),
    }
}

#[derive(Deserialize)]
pub struct CreateTokenRequest {
    pub access_token: Option<String>,
    pub token_name: Option<String>,
    pub dataset_id: Option<String>,
    pub dataset_name: Option<String>,
    pub gtm_container_id: Option<String>,
}

pub async fn create_token(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateTokenRequest>,
) -> Result<Json<Value>, ApiError> {
    let required = |field: Option<String>| field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let (Some(access_token), Some(dataset_id), Some(gtm_container_id)) = (
        required(body.access_token),
        required(body.dataset_id),
        required(body.gtm_container_id),
    ) else {
        return Err(ApiError::BadRequest(
            "Access Token, Dataset ID and GTM Container ID are required".to_string(),
        ));
    };

    let token_name = body
        .token_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(generate_token_name);

    let token = ctx
        .storage
        .create_token(
            &token_name,
            &dataset_id,
            body.dataset_name.as_deref(),
            &access_token,
            &gtm_container_id,
        )
        .await?;

    Ok(Json(json!({
        "msg": "Facebook token created",
        "token": token,
    })))
}

pub async fn delete_token(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if ctx.storage.get_token(&id).await?.is_none() {
        return Err(ApiError::NotFound("Token not found".to_string()));
    }
    ctx.storage.delete_token(&id).await?;
    Ok(Json(json!({ "msg": "Token deleted" })))
}

/// Flip the active flag. Inactive tokens refuse relayed events (403) and
/// disappear from token-info.
pub async fn toggle_token(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = ctx.storage.get_token(&id).await? else {
        return Err(ApiError::NotFound("Token not found".to_string()));
    };
    ctx.storage.set_token_active(&id, !token.is_active).await?;
    let token = ctx
        .storage
        .get_token(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("token vanished during toggle"))?;
    Ok(Json(json!({ "token": token })))
}

/// The GTM bridge snippet for this token, ready to paste into a tag.
pub async fn get_token_script(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(token) = ctx.storage.get_token(&id).await? else {
        return Err(ApiError::NotFound("Token not found".to_string()));
    };
    let script = scripts::render_bridge_script(
        &ctx.config.scripts.public_api_url,
        &token.gtm_container_id,
        &token.dataset_id,
    );
    Ok(Json(json!({
        "script_template": script,
        "token": token,
    })))
}

/// Public lookup used by generated scripts at page runtime. Only active
/// tokens are exposed; `pixel_id` aliases `dataset_id`.
pub async fn get_token_info(
    State(ctx): State<Arc<AppContext>>,
    Path(gtm_container_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match ctx
        .storage
        .get_active_token_by_container(&gtm_container_id)
        .await?
    {
        Some(token) => Ok(Json(json!({
            "pixel_id": token.dataset_id,
            "access_token": token.access_token,
            "dataset_id": token.dataset_id,
        }))),
        None => Err(ApiError::NotFound(
            "Token not found or inactive".to_string(),
        )),
    }
}

fn generate_token_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("Token_{}", &suffix[..16])
}
