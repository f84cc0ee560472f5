use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::state::AppState;

/// Name of the browser session cookie carrying the JWT.
pub const SESSION_COOKIE: &str = "bevops_session";

/// Authenticated user context extracted from the session token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

/// Session middleware: validates the JWT from either the Authorization
/// header (API clients) or the session cookie (browser flows) and injects
/// `AuthUser` into the request. Rejects with 401 before any handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token_from_headers(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let claims = auth::verify_session_token(&token, &state.config.security.session_secret)
        .map_err(|_| ApiError::unauthorized("Unauthorized"))?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Pull the session token out of `Authorization: Bearer …` or the session
/// cookie, in that order.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("authorization") {
        if let Ok(value) = auth_header.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                if !token.trim().is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}
