use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth;
use crate::middleware::auth::session_token_from_headers;
use crate::state::AppState;

/// GET / - landing page.
pub async fn home() -> Html<&'static str> {
    Html(include_str!("../../clients/home.html"))
}

/// GET /dashboard - authenticated landing page. Browsers without a valid
/// session are sent back to the login page.
pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let session = session_token_from_headers(&headers).and_then(|token| {
        auth::verify_session_token(&token, &state.config.security.session_secret).ok()
    });

    match session {
        Some(_) => Html(include_str!("../../clients/dashboard.html")).into_response(),
        None => (StatusCode::FOUND, [(header::LOCATION, "/login")]).into_response(),
    }
}

/// GET /health - liveness plus database status.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            // Log the real error; the body carries no connection details.
            error!("Database health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
