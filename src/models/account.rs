use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::database::{DatabaseError, Db};

/// Named tenant grouping. Name is unique; uniqueness is enforced with a
/// conditional insert rather than a separate lookup, so two concurrent
/// creates cannot both succeed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account name is required")]
    MissingName,

    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::Database(DatabaseError::Sqlx(err))
    }
}

impl Account {
    pub async fn create(db: &Db, name: &str) -> Result<Account, AccountError> {
        if name.trim().is_empty() {
            return Err(AccountError::MissingName);
        }

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;

        // Insert-if-absent; rolls back on drop if the commit is never reached.
        let result = sqlx::query(
            "INSERT INTO accounts (id, name, created_at)
             SELECT $1, $2, NOW()
             WHERE NOT EXISTS (SELECT 1 FROM accounts WHERE name = $2)",
        )
        .bind(id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountError::AlreadyExists(name.to_string()));
        }

        let account: Account = sqlx::query_as("SELECT id, name, created_at FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await.map_err(DatabaseError::Sqlx)?;
        info!("Created account {} ({})", account.name, account.id);
        Ok(account)
    }

    pub async fn find_by_id(db: &Db, id: Uuid) -> Result<Option<Account>, AccountError> {
        let account = sqlx::query_as("SELECT id, name, created_at FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(db.pool())
            .await?;
        Ok(account)
    }

    pub async fn find_by_name(db: &Db, name: &str) -> Result<Option<Account>, AccountError> {
        let account = sqlx::query_as("SELECT id, name, created_at FROM accounts WHERE name = $1")
            .bind(name)
            .fetch_optional(db.pool())
            .await?;
        Ok(account)
    }
}
