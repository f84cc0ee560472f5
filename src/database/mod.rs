use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pooled access to the relational store.
///
/// Models run their own statements against the pool; this wrapper owns pool
/// construction, liveness checks, and transaction scoping. A transaction
/// obtained from [`Db::begin`] rolls back automatically when dropped without
/// a commit, so the connection is released on every exit path.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Build the pool without dialing the server; connections are opened on
    /// first use, matching the lazy behavior of the underlying driver.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.host.is_empty() {
            return Err(DatabaseError::ConfigMissing("PG_HOST"));
        }

        let started = Instant::now();
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(Duration::from_millis(config.idle_timeout_ms))
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect_lazy(&config.connection_url())?;

        debug!(
            "Created database pool for {} in {}ms",
            config.database,
            started.elapsed().as_millis()
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to verify connectivity.
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Begin a transaction. Callers must commit explicitly; dropping the
    /// returned handle rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            e
        })?;
        Ok(tx)
    }
}
