use std::path::Path;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use bevops::config::AppConfig;
use bevops::state::AppState;

/// Build an isolated application state for one test. Nothing is shared
/// between tests; each gets its own stores and connection manager.
pub fn test_state(orgs_dir: &Path) -> AppState {
    let mut config = AppConfig::default();
    config.security.session_secret = "integration-test-secret".to_string();
    config.server.orgs_dir = orgs_dir.display().to_string();
    config.salesforce.client_id = "test-client-id".to_string();
    config.salesforce.client_secret = "test-client-secret".to_string();
    AppState::new(config).expect("failed to build test state")
}

/// Drive one request through the router.
pub async fn send(state: &AppState, request: Request<Body>) -> Result<Response<Body>> {
    let app = bevops::app(state.clone());
    Ok(app.oneshot(request).await?)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request build")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request build")
}

pub async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Register a user and return a session token for them.
pub async fn signup(state: &AppState, username: &str) -> Result<String> {
    let response = send(
        state,
        json_request(
            "POST",
            "/signup",
            None,
            &serde_json::json!({
                "username": username,
                "password": "pass1234",
                "email": format!("{}@example.com", username),
                "firstName": "Test",
            }),
        ),
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    let token = body["token"].as_str().expect("token in signup response");
    Ok(token.to_string())
}
