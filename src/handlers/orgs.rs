use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::org::{NewOrg, Org, OrgConnectionState};
use crate::salesforce::ConnectionDetails;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrgRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectOrgRequest {
    pub instance_url: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub login_url: Option<String>,
}

/// GET /orgs - list the requesting user's orgs.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Org>>, ApiError> {
    let orgs = state.orgs.find(user.user_id).await;
    info!("Found {} orgs for user {}", orgs.len(), user.user_id);
    Ok(Json(orgs))
}

/// GET /orgs/:orgId - fetch one org. The registry lookup ignores ownership;
/// the ownership check lives here.
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(org_id): Path<String>,
) -> Result<Json<Org>, ApiError> {
    let org = find_org(&state, &org_id).await?;
    if org.user_id != user.user_id {
        return Err(ApiError::forbidden("Forbidden"));
    }
    Ok(Json(org))
}

/// POST /orgs - register a new org for the user.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateOrgRequest>,
) -> Result<(StatusCode, Json<Org>), ApiError> {
    let org = state
        .orgs
        .create(NewOrg {
            name: req.name,
            description: req.description,
            user_id: user.user_id,
        })
        .await;
    info!("Created org {} for user {}", org.id, user.user_id);
    Ok((StatusCode::CREATED, Json(org)))
}

/// DELETE /orgs/:orgId - owner-only removal.
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(org_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let org = find_org(&state, &org_id).await?;
    if org.user_id != user.user_id {
        return Err(ApiError::forbidden("Forbidden"));
    }
    state.orgs.delete(org.id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /orgs/:orgId/connect - hand OAuth details for the org to the
/// connection manager and record the connection state on the registry
/// entry.
pub async fn connect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(org_id): Path<String>,
    Json(req): Json<ConnectOrgRequest>,
) -> Result<Json<Org>, ApiError> {
    let org = find_org(&state, &org_id).await?;
    if org.user_id != user.user_id {
        return Err(ApiError::forbidden("Forbidden"));
    }

    let details = ConnectionDetails {
        record_id: org.id.to_string(),
        instance_url: req.instance_url,
        access_token: SecretString::from(req.access_token),
        refresh_token: SecretString::from(req.refresh_token),
        login_url: req.login_url,
    };

    let canonical = state
        .connections
        .add_org_connection(details, user.user_id)
        .await?;

    // Index the live record by name; a failure here loses only the
    // secondary index, not the connection.
    if let Err(e) = state
        .connections
        .save_org(&canonical.record_id, &org.name, user.user_id)
        .await
    {
        warn!("Failed to index org {} by name: {}", canonical.record_id, e);
    }

    let updated = state
        .orgs
        .set_connection(
            org.id,
            OrgConnectionState {
                connection_id: Uuid::new_v4(),
                instance_url: canonical.instance_url.clone(),
                connected_at: Utc::now(),
            },
        )
        .await
        .ok_or_else(|| ApiError::not_found("Org not found"))?;

    info!("Connected org {} for user {}", updated.id, user.user_id);
    Ok(Json(updated))
}

async fn find_org(state: &AppState, org_id: &str) -> Result<Org, ApiError> {
    let org_id = Uuid::parse_str(org_id).map_err(|_| ApiError::not_found("Org not found"))?;
    state
        .orgs
        .find_by_id(org_id)
        .await
        .ok_or_else(|| ApiError::not_found("Org not found"))
}
