//! Org connection lifecycle manager.
//!
//! Establishes and tracks an authenticated session to each connected
//! Salesforce organization and coordinates one-time metadata initialization
//! per org. All state is owned by the manager instance and injected through
//! `AppState`; there are no process-wide maps.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SalesforceConfig;

use super::oauth::{self, OAuth2Config};
use super::SfdcError;

pub const METADATA_API_VERSION: &str = "60.0";

/// Metadata types pulled during first-time org initialization.
pub const INIT_WITH_TYPES: [&str; 4] = [
    "GlobalValueSet",
    "CustomObject",
    "CustomLabels",
    "StandardValueSet",
];

/// A validation lease older than this is treated as abandoned (e.g. a crash
/// mid-initialization) and may be re-acquired.
const VALIDATION_LEASE_TTL: Duration = Duration::from_secs(300);

/// Applies to the identity check, code exchange, and token refresh calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth details handed to the manager when connecting an org.
#[derive(Debug, Clone)]
pub struct ConnectionDetails {
    pub record_id: String,
    pub instance_url: String,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Defaults to the sandbox endpoint when unspecified.
    pub login_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrgManifest {
    pub is_generating: bool,
    pub last_synced: Option<DateTime<Utc>>,
}

/// Transient, process-lifetime state for one connected org.
#[derive(Debug, Clone)]
pub struct LiveOrg {
    pub record_id: String,
    pub name: Option<String>,
    pub instance_url: String,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub login_url: String,
    pub workspace_dir: PathBuf,
    pub manifest: OrgManifest,
    pub metadata_api_version: String,
    pub init_with_types: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreInner {
    orgs_by_id: HashMap<String, LiveOrg>,
    /// Secondary index: org name to record id.
    orgs_by_name: HashMap<String, String>,
    /// In-flight initialization leases, by record id.
    validation_leases: HashMap<String, Instant>,
}

pub struct OrgConnectionManager {
    store: RwLock<StoreInner>,
    http: reqwest::Client,
    oauth: OAuth2Config,
    default_login_url: String,
    orgs_dir: PathBuf,
}

impl OrgConnectionManager {
    pub fn new(config: &SalesforceConfig, orgs_dir: impl Into<PathBuf>) -> Result<Self, SfdcError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SfdcError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            store: RwLock::new(StoreInner::default()),
            http,
            oauth: OAuth2Config {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_uri: config.callback_url.clone(),
            },
            default_login_url: config.default_login_url.clone(),
            orgs_dir: orgs_dir.into(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn oauth_config(&self) -> &OAuth2Config {
        &self.oauth
    }

    pub fn default_login_url(&self) -> &str {
        &self.default_login_url
    }

    /// Establish a live connection for an org.
    ///
    /// Verifies connectivity with an identity call before registering
    /// anything; a failed check propagates to the caller and leaves no
    /// state behind. When the org already has a live entry the stored
    /// (canonical) details are returned and no side effects run again.
    pub async fn add_org_connection(
        &self,
        details: ConnectionDetails,
        user_id: Uuid,
    ) -> Result<ConnectionDetails, SfdcError> {
        if details.record_id.is_empty() {
            return Err(SfdcError::OrgIdRequired);
        }

        if let Some(existing) = self.connection_details(&details.record_id).await {
            info!("Org {} already connected", details.record_id);
            return Ok(existing);
        }

        let login_url = details
            .login_url
            .clone()
            .unwrap_or_else(|| self.default_login_url.clone());

        let identity =
            oauth::identity(&self.http, &details.instance_url, &details.access_token).await?;
        info!(
            "Verified org {} (sf org {}) for user {}",
            details.record_id, identity.organization_id, user_id
        );

        let workspace_dir = self.orgs_dir.join(&details.record_id);
        tokio::fs::create_dir_all(&workspace_dir).await?;

        let live = LiveOrg {
            record_id: details.record_id.clone(),
            name: None,
            instance_url: details.instance_url.clone(),
            access_token: details.access_token.clone(),
            refresh_token: details.refresh_token.clone(),
            login_url,
            workspace_dir,
            manifest: OrgManifest {
                is_generating: false,
                last_synced: None,
            },
            metadata_api_version: METADATA_API_VERSION.to_string(),
            init_with_types: INIT_WITH_TYPES.iter().map(|s| s.to_string()).collect(),
            connected_at: Utc::now(),
        };

        // Insert-if-absent under one write lock: a racing connect for the
        // same record id cannot register twice.
        let canonical = {
            let mut store = self.store.write().await;
            let entry = store
                .orgs_by_id
                .entry(details.record_id.clone())
                .or_insert(live);
            Self::details_of(entry)
        };

        // Skips itself when a validation lease is already held.
        self.ensure_org_metadata_initialized(&details.record_id, user_id)
            .await?;

        Ok(canonical)
    }

    /// One-time metadata initialization for a connected org.
    ///
    /// Runs under a validation lease; the acquiring call releases it on
    /// success and failure alike. When another caller already holds the
    /// lease this returns `Ok(false)` without touching it, so a concurrent
    /// initialization is never duplicated and never has its lease wiped.
    /// Returns `false` as well when no live connection exists for the id.
    pub async fn ensure_org_metadata_initialized(
        &self,
        record_id: &str,
        user_id: Uuid,
    ) -> Result<bool, SfdcError> {
        if record_id.is_empty() {
            return Err(SfdcError::OrgIdRequired);
        }

        if !self.acquire_validation_lease(record_id).await {
            info!("Metadata initialization already in progress for {}", record_id);
            return Ok(false);
        }
        let result = self.initialize_metadata(record_id, user_id).await;
        self.release_validation_lease(record_id).await;

        if let Err(ref e) = result {
            error!("Failed to ensure org metadata for {}: {}", record_id, e);
        }
        result
    }

    async fn initialize_metadata(
        &self,
        record_id: &str,
        user_id: Uuid,
    ) -> Result<bool, SfdcError> {
        let name = {
            let store = self.store.read().await;
            match store.orgs_by_id.get(record_id) {
                Some(org) => org.name.clone(),
                None => return Ok(false),
            }
        };

        // Persist the connection descriptor. The downstream initialization
        // job (metadata pull for init_with_types) is not wired up yet.
        if let Some(name) = name {
            if let Err(e) = self.save_org(record_id, &name, user_id).await {
                warn!("Deferred save of org {} failed: {}", record_id, e);
            }
        }

        Ok(true)
    }

    /// Upsert the org into both indexes. First write wins; an existing entry
    /// with the same key is never overwritten. A missing record id or name
    /// makes the call a no-op.
    pub async fn save_org(
        &self,
        record_id: &str,
        name: &str,
        user_id: Uuid,
    ) -> Result<(), SfdcError> {
        if record_id.is_empty() || name.is_empty() {
            return Ok(());
        }

        info!("Saving org {} ({}) for user {}", record_id, name, user_id);
        let mut store = self.store.write().await;
        store
            .orgs_by_name
            .entry(name.to_string())
            .or_insert_with(|| record_id.to_string());
        if let Some(org) = store.orgs_by_id.get_mut(record_id) {
            if org.name.is_none() {
                org.name = Some(name.to_string());
            }
        }
        Ok(())
    }

    /// Exchange the refresh token for a new access token and swap it in
    /// place. On provider rejection the stored token is left untouched and
    /// the error is returned to the caller; the process carries on.
    pub async fn refresh_access_token(&self, record_id: &str) -> Result<(), SfdcError> {
        let (login_url, refresh_token) = {
            let store = self.store.read().await;
            let org = store
                .orgs_by_id
                .get(record_id)
                .ok_or_else(|| SfdcError::Connection(format!("no live org: {}", record_id)))?;
            (org.login_url.clone(), org.refresh_token.clone())
        };

        match oauth::refresh_access_token(&self.http, &login_url, &self.oauth, &refresh_token).await
        {
            Ok(token) => {
                let mut store = self.store.write().await;
                if let Some(org) = store.orgs_by_id.get_mut(record_id) {
                    org.access_token = SecretString::from(token.access_token);
                    org.instance_url = token.instance_url;
                }
                info!("Access token refreshed for org {}", record_id);
                Ok(())
            }
            Err(e) => {
                error!("Error refreshing access token for {}: {}", record_id, e);
                Err(e)
            }
        }
    }

    pub async fn connection(&self, record_id: &str) -> Option<LiveOrg> {
        let store = self.store.read().await;
        store.orgs_by_id.get(record_id).cloned()
    }

    pub async fn connection_by_name(&self, name: &str) -> Option<LiveOrg> {
        let store = self.store.read().await;
        let record_id = store.orgs_by_name.get(name)?;
        store.orgs_by_id.get(record_id).cloned()
    }

    async fn connection_details(&self, record_id: &str) -> Option<ConnectionDetails> {
        let store = self.store.read().await;
        store.orgs_by_id.get(record_id).map(Self::details_of)
    }

    fn details_of(org: &LiveOrg) -> ConnectionDetails {
        ConnectionDetails {
            record_id: org.record_id.clone(),
            instance_url: org.instance_url.clone(),
            access_token: org.access_token.clone(),
            refresh_token: org.refresh_token.clone(),
            login_url: Some(org.login_url.clone()),
        }
    }

    async fn acquire_validation_lease(&self, record_id: &str) -> bool {
        let mut store = self.store.write().await;
        let now = Instant::now();
        store
            .validation_leases
            .retain(|_, acquired| now.duration_since(*acquired) < VALIDATION_LEASE_TTL);

        if store.validation_leases.contains_key(record_id) {
            return false;
        }
        store.validation_leases.insert(record_id.to_string(), now);
        true
    }

    async fn release_validation_lease(&self, record_id: &str) {
        let mut store = self.store.write().await;
        store.validation_leases.remove(record_id);
    }

    pub async fn validation_lease_held(&self, record_id: &str) -> bool {
        let store = self.store.read().await;
        store
            .validation_leases
            .get(record_id)
            .map(|acquired| acquired.elapsed() < VALIDATION_LEASE_TTL)
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) async fn insert_live_org_for_tests(&self, org: LiveOrg) {
        let mut store = self.store.write().await;
        store.orgs_by_id.insert(org.record_id.clone(), org);
    }
}
