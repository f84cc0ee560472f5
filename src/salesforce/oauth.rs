//! OAuth2 calls against the Salesforce identity provider: authorize URL
//! construction, code exchange, token refresh, and the userinfo identity
//! check.
//!
//! Token values never appear in logs.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use super::SfdcError;

/// Connected-app credentials plus the redirect URI registered with it.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Response from the token endpoint (code exchange and refresh).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub issued_at: String,
}

/// Identity fields from the userinfo endpoint.
#[derive(Debug, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub preferred_username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Build the authorization-code URL the browser is redirected to.
pub fn authorize_url(login_url: &str, config: &OAuth2Config) -> Result<String, SfdcError> {
    let mut url = Url::parse(login_url)
        .map_err(|e| SfdcError::OAuth(format!("invalid login URL: {}", e)))?;
    url.set_path("/services/oauth2/authorize");
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri);
    Ok(url.into())
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    login_url: &str,
    config: &OAuth2Config,
    code: &str,
) -> Result<TokenResponse, SfdcError> {
    let token_url = format!("{}/services/oauth2/token", login_url);

    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("code", code),
    ];

    let response = http
        .post(&token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| SfdcError::Connection(format!("code exchange request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        error!("Code exchange failed: {}", status);
        return Err(SfdcError::OAuth(format!("code exchange failed: {}", status)));
    }

    response
        .json()
        .await
        .map_err(|_| SfdcError::OAuth("invalid token response".to_string()))
}

/// Exchange a refresh token for a new access token.
///
/// A 400 or 401 from the provider means the refresh token itself is invalid
/// or expired and the org must go through the OAuth flow again.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    login_url: &str,
    config: &OAuth2Config,
    refresh_token: &SecretString,
) -> Result<TokenResponse, SfdcError> {
    let token_url = format!("{}/services/oauth2/token", login_url);

    info!("Refreshing Salesforce access token");

    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh_token.expose_secret()),
    ];

    let response = http
        .post(&token_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| SfdcError::Connection(format!("token refresh request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|_| SfdcError::OAuth("invalid token refresh response".to_string()))?;
        if token.access_token.is_empty() {
            return Err(SfdcError::OAuth(
                "access token not found after refresh".to_string(),
            ));
        }
        Ok(token)
    } else if status == reqwest::StatusCode::BAD_REQUEST
        || status == reqwest::StatusCode::UNAUTHORIZED
    {
        error!("Token refresh rejected: {}", status);
        Err(SfdcError::SessionExpired)
    } else {
        error!("Token refresh failed with status: {}", status);
        Err(SfdcError::OAuth(format!("token refresh failed: {}", status)))
    }
}

/// Identity check: verifies the access token is live against the org's
/// userinfo endpoint.
pub async fn identity(
    http: &reqwest::Client,
    instance_url: &str,
    access_token: &SecretString,
) -> Result<Identity, SfdcError> {
    let url = format!("{}/services/oauth2/userinfo", instance_url);

    let response = http
        .get(&url)
        .bearer_auth(access_token.expose_secret())
        .send()
        .await
        .map_err(|e| SfdcError::Connection(format!("identity request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|_| SfdcError::OAuth("invalid identity response".to_string()))
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        Err(SfdcError::SessionExpired)
    } else {
        Err(SfdcError::Connection(format!("identity check failed: {}", status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuth2Config {
        OAuth2Config {
            client_id: "client-id-123".to_string(),
            client_secret: "shhh".to_string(),
            redirect_uri: "http://localhost:3000/auth/callback".to_string(),
        }
    }

    #[test]
    fn authorize_url_carries_client_id_and_redirect() {
        let url = authorize_url("https://test.salesforce.com", &test_config()).unwrap();
        assert!(url.starts_with("https://test.salesforce.com/services/oauth2/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-id-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));
    }

    #[test]
    fn authorize_url_rejects_garbage_login_url() {
        assert!(matches!(
            authorize_url("not a url", &test_config()),
            Err(SfdcError::OAuth(_))
        ));
    }
}
