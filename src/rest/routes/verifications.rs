// rest/routes/verifications.rs — domain ownership claims: CRUD, the
// verify action, and the embeddable verification snippet.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::error::ApiError;
use crate::scripts;
use crate::verification::{
    check_site_for_token, generate_verification_token, is_valid_container_id,
    is_valid_domain_name, VerifyError,
};
use crate::AppContext;

pub async fn list_verifications(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, ApiError> {
    let verifications = ctx.storage.list_verifications().await?;
    Ok(Json(json!({ "verifications": verifications })))
}

#[derive(Deserialize)]
pub struct CreateVerificationRequest {
    pub gtm_container_id: Option<String>,
    pub domain_name: Option<String>,
}

pub async fn create_verification(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateVerificationRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(gtm_container_id), Some(domain_name)) = (
        body.gtm_container_id.filter(|v| !v.trim().is_empty()),
        body.domain_name.filter(|v| !v.trim().is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "GTM Container ID and Domain Name are required".to_string(),
        ));
    };

    if !is_valid_container_id(&gtm_container_id) {
        return Err(ApiError::BadRequest(
            "Invalid GTM Container ID format. Example: GTM-XXXXXX".to_string(),
        ));
    }
    if !is_valid_domain_name(&domain_name) {
        return Err(ApiError::BadRequest("Invalid domain format".to_string()));
    }
    if ctx
        .storage
        .find_verification_by_domain(&domain_name)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(
            "A GTM verification already exists for this domain".to_string(),
        ));
    }

    let verification = ctx
        .storage
        .create_verification(&gtm_container_id, &domain_name, &generate_verification_token())
        .await?;
    Ok(Json(json!({ "verification": verification })))
}

#[derive(Deserialize)]
pub struct UpdateVerificationRequest {
    pub gtm_container_id: Option<String>,
    pub domain_name: Option<String>,
}

pub async fn update_verification(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateVerificationRequest>,
) -> Result<Json<Value>, ApiError> {
    if ctx.storage.get_verification(&id).await?.is_none() {
        return Err(ApiError::NotFound("GTM verification not found".to_string()));
    }

    if let Some(container) = body.gtm_container_id.as_deref() {
        if !is_valid_container_id(container) {
            return Err(ApiError::BadRequest(
                "Invalid GTM Container ID format. Example: GTM-XXXXXX".to_string(),
            ));
        }
    }
    if let Some(domain) = body.domain_name.as_deref() {
        if !is_valid_domain_name(domain) {
            return Err(ApiError::BadRequest("Invalid domain format".to_string()));
        }
    }

    let verification = ctx
        .storage
        .update_verification(
            &id,
            body.gtm_container_id.as_deref(),
            body.domain_name.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("GTM verification not found".to_string()))?;
    Ok(Json(json!({ "verification": verification })))
}

/// Deleting a claim also deletes the Facebook tokens bound to its
/// container — events for that container must stop relaying.
pub async fn delete_verification(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(verification) = ctx.storage.get_verification(&id).await? else {
        return Err(ApiError::NotFound("GTM verification not found".to_string()));
    };

    let tokens_deleted = ctx
        .storage
        .delete_tokens_by_container(&verification.gtm_container_id)
        .await?;
    ctx.storage.delete_verification(&id).await?;

    Ok(Json(json!({
        "msg": "GTM verification deleted",
        "tokens_deleted": tokens_deleted,
    })))
}

/// Fetch the registered domain and look for the verification token in
/// the page body.
pub async fn verify_verification(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(verification) = ctx.storage.get_verification(&id).await? else {
        return Err(ApiError::NotFound("GTM verification not found".to_string()));
    };
    if verification.is_verified {
        return Err(ApiError::BadRequest(
            "GTM verification already verified".to_string(),
        ));
    }

    match check_site_for_token(
        &ctx.http,
        &verification.domain_name,
        &verification.verification_token,
    )
    .await
    {
        Ok(()) => {
            ctx.storage.mark_verified(&id).await?;
            let verification = ctx
                .storage
                .get_verification(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("verification vanished during verify"))?;
            Ok(Json(json!({
                "msg": "GTM verification successful",
                "verification": verification,
            })))
        }
        Err(e @ VerifyError::TokenNotFound { .. }) => Err(ApiError::BadRequest(format!(
            "{e} (token: {}, url: {})",
            verification.verification_token,
            e.url()
        ))),
        Err(e) => Err(ApiError::BadRequest(format!("{e} (url: {})", e.url()))),
    }
}

pub async fn get_verification_script(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let Some(verification) = ctx.storage.get_verification(&id).await? else {
        return Err(ApiError::NotFound("GTM verification not found".to_string()));
    };
    Ok(Json(json!({
        "verification_token": verification.verification_token,
        "verification_script": scripts::render_verification_snippet(&verification),
    })))
}
