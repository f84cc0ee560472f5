use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::account::Account;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
}

/// POST /accounts - create a named tenant grouping. Duplicate names are a
/// 409; the uniqueness check is a single conditional insert.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = Account::create(&state.db, &req.name).await?;
    info!("User {} created account {}", user.user_id, account.id);
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /accounts/:accountId
pub async fn show(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Path(account_id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let account_id =
        Uuid::parse_str(&account_id).map_err(|_| ApiError::not_found("Account not found"))?;
    let account = Account::find_by_id(&state.db, account_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;
    Ok(Json(account))
}
