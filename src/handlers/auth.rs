use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{error, info};
use url::form_urlencoded;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::middleware::SESSION_COOKIE;
use crate::models::user::{NewUser, User};
use crate::salesforce::oauth;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// GET /login - serve the login page.
pub async fn login_page() -> Html<&'static str> {
    Html(include_str!("../../clients/login.html"))
}

/// GET /signup - serve the registration page.
pub async fn signup_page() -> Html<&'static str> {
    Html(include_str!("../../clients/signup.html"))
}

/// POST /login - authenticate with the local strategy.
///
/// API callers (JSON content type) get a JSON payload with the session
/// token; browsers get a redirect with a session cookie. Bad credentials
/// are a 401 for the API and a `/login?error=…` redirect for browsers.
pub async fn login_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: LoginRequest = parse_body(&headers, &body)?;
    info!("POST /login for {}", req.username);

    let user = state.users.find_by_username(&req.username).await;
    let verified = user
        .as_ref()
        .and_then(|u| u.password_hash.as_deref())
        .map(|hash| auth::verify_password(&req.password, hash).unwrap_or(false))
        .unwrap_or(false);

    let Some(user) = user.filter(|_| verified) else {
        info!("POST /login rejected for {}", req.username);
        return Ok(reject_login(&headers, "Invalid username or password"));
    };

    let token = issue_session(&state, &user)?;
    if wants_json(&headers) {
        Ok(Json(json!({ "message": "Logged in", "user": user, "token": token })).into_response())
    } else {
        Ok(session_redirect("/dashboard", &token))
    }
}

/// POST /signup - register a new user.
///
/// Any of username/password/email/firstName missing or blank is a 400 and
/// no user record is created. A taken username is a 409; it never resolves
/// to the existing user, so signup cannot mint a session for someone else's
/// account. On success the user is logged in immediately.
pub async fn signup_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: SignupRequest = parse_body(&headers, &body)?;
    info!("POST /signup for {}", req.username);

    if req.username.trim().is_empty()
        || req.password.is_empty()
        || req.email.trim().is_empty()
        || req.first_name.trim().is_empty()
    {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let user = state
        .users
        .create(NewUser {
            username: req.username,
            password: req.password,
            email: req.email,
            first_name: Some(req.first_name),
            last_name: req.last_name,
        })
        .await?;

    let token = issue_session(&state, &user)?;
    if wants_json(&headers) {
        Ok(Json(json!({
            "message": "Registration successful",
            "user": user,
            "token": token
        }))
        .into_response())
    } else {
        Ok(session_redirect("/dashboard", &token))
    }
}

/// GET /login/salesforce - redirect the browser to the provider.
pub async fn login_salesforce(State(state): State<AppState>) -> Result<Response, ApiError> {
    let url = oauth::authorize_url(
        state.connections.default_login_url(),
        state.connections.oauth_config(),
    )?;
    Ok(found(&url))
}

/// GET /auth/callback - OAuth code exchange.
///
/// Resolves or creates the user from the Salesforce identity, then
/// establishes a browser session. Failures land back on the login page
/// with an error query parameter.
pub async fn salesforce_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    if let Some(err) = query.error {
        return Ok(login_error_redirect(&err));
    }
    let Some(code) = query.code else {
        return Ok(login_error_redirect("Missing authorization code"));
    };

    let manager = &state.connections;
    let token = match oauth::exchange_code(
        manager.http(),
        manager.default_login_url(),
        manager.oauth_config(),
        &code,
    )
    .await
    {
        Ok(token) => token,
        Err(e) => {
            error!("Salesforce code exchange failed: {}", e);
            return Ok(login_error_redirect("Salesforce login failed"));
        }
    };

    let access_token = SecretString::from(token.access_token.clone());
    let identity = match oauth::identity(manager.http(), &token.instance_url, &access_token).await {
        Ok(identity) => identity,
        Err(e) => {
            error!("Salesforce identity lookup failed: {}", e);
            return Ok(login_error_redirect("Salesforce login failed"));
        }
    };

    let user = state
        .users
        .find_or_create_by_salesforce_id(&identity.user_id, &identity.email, &identity.name)
        .await;

    let session = issue_session(&state, &user)?;
    Ok(session_redirect("/dashboard", &session))
}

/// GET /logout - clear the session and send the browser home.
pub async fn logout() -> Response {
    (
        StatusCode::FOUND,
        [
            (
                header::SET_COOKIE,
                format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE),
            ),
            (header::LOCATION, "/".to_string()),
        ],
    )
        .into_response()
}

fn issue_session(state: &AppState, user: &User) -> Result<String, ApiError> {
    let claims = Claims::new(
        user.id,
        user.username.clone(),
        state.config.security.session_expiry_hours,
    );
    Ok(auth::generate_session_token(
        &claims,
        &state.config.security.session_secret,
    )?)
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

/// Parse the request body as JSON or an urlencoded form, by content type.
fn parse_body<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, ApiError> {
    if wants_json(headers) {
        serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))
    } else {
        let fields: serde_json::Map<String, Value> = form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiError::bad_request(format!("Invalid form body: {}", e)))
    }
}

fn reject_login(headers: &HeaderMap, message: &str) -> Response {
    if wants_json(headers) {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
    } else {
        login_error_redirect(message)
    }
}

/// Plain 302 redirect; browser flows use Found rather than See Other.
fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

fn login_error_redirect(message: &str) -> Response {
    let encoded: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
    found(&format!("/login?error={}", encoded))
}

fn session_redirect(location: &str, token: &str) -> Response {
    (
        StatusCode::FOUND,
        [
            (
                header::SET_COOKIE,
                format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token),
            ),
            (header::LOCATION, location.to_string()),
        ],
    )
        .into_response()
}
