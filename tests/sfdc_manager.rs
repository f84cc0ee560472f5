use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bevops::config::SalesforceConfig;
use bevops::salesforce::{ConnectionDetails, OrgConnectionManager, SfdcError};

fn manager(orgs_dir: &std::path::Path) -> OrgConnectionManager {
    let config = SalesforceConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        callback_url: "http://localhost:3000/auth/callback".to_string(),
        default_login_url: "https://test.salesforce.com".to_string(),
    };
    OrgConnectionManager::new(&config, orgs_dir).expect("manager")
}

fn details(record_id: &str, instance_url: &str, login_url: Option<&str>) -> ConnectionDetails {
    ConnectionDetails {
        record_id: record_id.to_string(),
        instance_url: instance_url.to_string(),
        access_token: SecretString::from("access-1".to_string()),
        refresh_token: SecretString::from("refresh-1".to_string()),
        login_url: login_url.map(|s| s.to_string()),
    }
}

async fn mount_userinfo(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/services/oauth2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "005xx000001X8Uz",
            "organization_id": "00Dxx0000001gPL",
            "preferred_username": "it@example.com",
            "email": "it@example.com",
            "name": "Integration User"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn add_org_connection_registers_a_populated_live_record() -> Result<()> {
    let server = MockServer::start().await;
    mount_userinfo(&server, 1).await;
    let dir = tempfile::tempdir()?;
    let manager = manager(dir.path());

    let stored = manager
        .add_org_connection(details("org-1", &server.uri(), None), Uuid::new_v4())
        .await?;

    // Login URL defaults to the sandbox endpoint when unspecified.
    assert_eq!(stored.login_url.as_deref(), Some("https://test.salesforce.com"));

    let live = manager.connection("org-1").await.expect("live record");
    assert_eq!(live.instance_url, server.uri());
    assert_eq!(live.access_token.expose_secret(), "access-1");
    assert_eq!(live.refresh_token.expose_secret(), "refresh-1");
    assert_eq!(live.metadata_api_version, "60.0");
    assert_eq!(
        live.init_with_types,
        ["GlobalValueSet", "CustomObject", "CustomLabels", "StandardValueSet"]
    );
    assert!(!live.manifest.is_generating);
    assert!(live.manifest.last_synced.is_none());

    // The per-org working directory is created as a side effect.
    assert!(dir.path().join("org-1").is_dir());
    Ok(())
}

#[tokio::test]
async fn repeated_add_is_idempotent_and_returns_the_stored_record() -> Result<()> {
    let server = MockServer::start().await;
    // A second identity check would trip the expectation.
    mount_userinfo(&server, 1).await;
    let dir = tempfile::tempdir()?;
    let manager = manager(dir.path());

    let first = manager
        .add_org_connection(details("org-1", &server.uri(), None), Uuid::new_v4())
        .await?;

    // Re-add with a different token: the canonical stored record wins.
    let mut second_details = details("org-1", &server.uri(), None);
    second_details.access_token = SecretString::from("access-2".to_string());
    let second = manager
        .add_org_connection(second_details, Uuid::new_v4())
        .await?;

    assert_eq!(second.access_token.expose_secret(), "access-1");
    assert_eq!(
        second.access_token.expose_secret(),
        first.access_token.expose_secret()
    );
    assert_eq!(second.record_id, "org-1");
    Ok(())
}

#[tokio::test]
async fn failed_identity_check_propagates_and_registers_nothing() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/oauth2/userinfo"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_session"
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;
    let manager = manager(dir.path());

    let result = manager
        .add_org_connection(details("org-x", &server.uri(), None), Uuid::new_v4())
        .await;

    assert!(matches!(result, Err(SfdcError::SessionExpired)));
    assert!(manager.connection("org-x").await.is_none());
    // No side effects for a connection that never verified.
    assert!(!dir.path().join("org-x").exists());
    Ok(())
}

#[tokio::test]
async fn token_refresh_swaps_the_stored_access_token() -> Result<()> {
    let server = MockServer::start().await;
    mount_userinfo(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-refreshed",
            "instance_url": server.uri(),
            "token_type": "Bearer",
            "issued_at": "1234567890"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;
    let manager = manager(dir.path());

    manager
        .add_org_connection(
            details("org-1", &server.uri(), Some(&server.uri())),
            Uuid::new_v4(),
        )
        .await?;

    manager.refresh_access_token("org-1").await?;

    let live = manager.connection("org-1").await.expect("live record");
    assert_eq!(live.access_token.expose_secret(), "access-refreshed");
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_leaves_the_stored_token_untouched() -> Result<()> {
    let server = MockServer::start().await;
    mount_userinfo(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "expired access/refresh token"
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;
    let manager = manager(dir.path());

    manager
        .add_org_connection(
            details("org-1", &server.uri(), Some(&server.uri())),
            Uuid::new_v4(),
        )
        .await?;

    let result = manager.refresh_access_token("org-1").await;
    assert!(matches!(result, Err(SfdcError::SessionExpired)));

    let live = manager.connection("org-1").await.expect("live record");
    assert_eq!(live.access_token.expose_secret(), "access-1");
    Ok(())
}

#[tokio::test]
async fn refresh_for_an_unknown_org_is_a_connection_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let manager = manager(dir.path());

    let result = manager.refresh_access_token("never-connected").await;
    assert!(matches!(result, Err(SfdcError::Connection(_))));
    Ok(())
}
