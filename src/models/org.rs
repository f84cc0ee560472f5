use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Connection state for an org that has completed the OAuth handshake.
///
/// Token material never lives here; it is held by the connection manager's
/// live record and is not serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConnectionState {
    pub connection_id: Uuid,
    pub instance_url: String,
    pub connected_at: DateTime<Utc>,
}

/// A Salesforce organization record owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Org {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub connection: Option<OrgConnectionState>,
}

#[derive(Debug, Clone)]
pub struct NewOrg {
    pub name: String,
    pub description: Option<String>,
    pub user_id: Uuid,
}

/// In-memory org registry (MVP). Lookups return the record regardless of
/// owner; access control is applied one layer up by the route handlers.
#[derive(Clone, Default)]
pub struct OrgRegistry {
    orgs: Arc<RwLock<Vec<Org>>>,
}

impl OrgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, new_org: NewOrg) -> Org {
        let org = Org {
            id: Uuid::new_v4(),
            name: new_org.name,
            description: new_org.description,
            user_id: new_org.user_id,
            created_at: Utc::now(),
            connection: None,
        };

        let mut orgs = self.orgs.write().await;
        orgs.push(org.clone());
        info!("Registered org {} for user {}", org.id, org.user_id);
        org
    }

    pub async fn find(&self, user_id: Uuid) -> Vec<Org> {
        let orgs = self.orgs.read().await;
        orgs.iter().filter(|o| o.user_id == user_id).cloned().collect()
    }

    pub async fn find_by_id(&self, org_id: Uuid) -> Option<Org> {
        let orgs = self.orgs.read().await;
        orgs.iter().find(|o| o.id == org_id).cloned()
    }

    pub async fn find_by_name(&self, name: &str) -> Option<Org> {
        let orgs = self.orgs.read().await;
        orgs.iter().find(|o| o.name == name).cloned()
    }

    pub async fn delete(&self, org_id: Uuid) -> bool {
        let mut orgs = self.orgs.write().await;
        let before = orgs.len();
        orgs.retain(|o| o.id != org_id);
        orgs.len() != before
    }

    /// Record a successful connection against the org.
    pub async fn set_connection(&self, org_id: Uuid, state: OrgConnectionState) -> Option<Org> {
        let mut orgs = self.orgs.write().await;
        let org = orgs.iter_mut().find(|o| o.id == org_id)?;
        org.connection = Some(state);
        Some(org.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_org(name: &str, user_id: Uuid) -> NewOrg {
        NewOrg {
            name: name.to_string(),
            description: Some("sandbox".to_string()),
            user_id,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_id_round_trips() {
        let registry = OrgRegistry::new();
        let user_id = Uuid::new_v4();
        let created = registry.create(new_org("Acme QA", user_id)).await;

        let found = registry.find_by_id(created.id).await.unwrap();
        assert_eq!(found.name, "Acme QA");
        assert_eq!(found.description.as_deref(), Some("sandbox"));
        assert_eq!(found.user_id, user_id);
    }

    #[tokio::test]
    async fn find_filters_by_owner() {
        let registry = OrgRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        registry.create(new_org("A1", alice)).await;
        registry.create(new_org("A2", alice)).await;
        registry.create(new_org("B1", bob)).await;

        assert_eq!(registry.find(alice).await.len(), 2);
        assert_eq!(registry.find(bob).await.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let registry = OrgRegistry::new();
        let org = registry.create(new_org("Gone", Uuid::new_v4())).await;
        assert!(registry.delete(org.id).await);
        assert!(!registry.delete(org.id).await);
        assert!(registry.find_by_id(org.id).await.is_none());
    }

    #[tokio::test]
    async fn set_connection_attaches_state() {
        let registry = OrgRegistry::new();
        let org = registry.create(new_org("Connected", Uuid::new_v4())).await;

        let state = OrgConnectionState {
            connection_id: Uuid::new_v4(),
            instance_url: "https://example.my.salesforce.com".to_string(),
            connected_at: Utc::now(),
        };
        let updated = registry.set_connection(org.id, state).await.unwrap();
        assert!(updated.connection.is_some());
    }
}
