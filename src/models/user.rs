use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, AuthError};

/// Identity record. Created on signup or on first OAuth login; never
/// hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub salesforce_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// In-memory credential store (MVP). Injected through `AppState` so each
/// test run gets an isolated instance instead of process-wide state.
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<Vec<User>>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user with a hashed password. Uniqueness of the username is
    /// checked and the record inserted under a single write lock.
    pub async fn create(&self, new_user: NewUser) -> Result<User, UserError> {
        let password_hash = auth::hash_password(&new_user.password)?;

        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == new_user.username) {
            return Err(UserError::UsernameTaken(new_user.username));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: Some(password_hash),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            salesforce_id: None,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        info!("Created user {}", user.id);
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Option<User> {
        let users = self.users.read().await;
        users.iter().find(|u| u.username == username).cloned()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<User> {
        let users = self.users.read().await;
        users.iter().find(|u| u.id == id).cloned()
    }

    /// Resolve a user from an OAuth profile, creating one on first login.
    pub async fn find_or_create_by_salesforce_id(
        &self,
        salesforce_id: &str,
        email: &str,
        display_name: &str,
    ) -> User {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter().find(|u| {
            u.salesforce_id.as_deref() == Some(salesforce_id)
        }) {
            return user.clone();
        }

        let user = User {
            id: Uuid::new_v4(),
            username: email.to_string(),
            email: email.to_string(),
            password_hash: None,
            first_name: Some(display_name.to_string()),
            last_name: None,
            salesforce_id: Some(salesforce_id.to_string()),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        info!("Created user {} from Salesforce profile", user.id);
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "pass123".to_string(),
            email: format!("{}@example.com", username),
            first_name: Some("Test".to_string()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn create_hashes_password_and_enforces_unique_username() {
        let store = UserStore::new();
        let user = store.create(sample_user("alice")).await.unwrap();
        assert_ne!(user.password_hash.as_deref(), Some("pass123"));

        let err = store.create(sample_user("alice")).await.unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken(_)));
    }

    #[tokio::test]
    async fn salesforce_first_login_creates_once() {
        let store = UserStore::new();
        let a = store
            .find_or_create_by_salesforce_id("005xx1", "carol@example.com", "Carol")
            .await;
        let b = store
            .find_or_create_by_salesforce_id("005xx1", "carol@example.com", "Carol")
            .await;
        assert_eq!(a.id, b.id);
        assert_eq!(a.salesforce_id.as_deref(), Some("005xx1"));
    }

    #[tokio::test]
    async fn serialized_user_omits_password_hash() {
        let store = UserStore::new();
        let user = store.create(sample_user("dave")).await.unwrap();
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["username"], "dave");
    }
}
