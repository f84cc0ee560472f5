use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::database::{DatabaseError, Db};
use crate::models::org::OrgRegistry;
use crate::models::user::UserStore;
use crate::salesforce::{OrgConnectionManager, SfdcError};

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sfdc(#[from] SfdcError),
}

/// Shared application state. Every store is owned here and injected into the
/// router, so tests run against isolated instances.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserStore,
    pub orgs: OrgRegistry,
    pub connections: Arc<OrgConnectionManager>,
    pub db: Db,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, StateError> {
        let db = Db::connect(&config.database)?;
        let connections = OrgConnectionManager::new(&config.salesforce, &config.server.orgs_dir)?;

        Ok(Self {
            config: Arc::new(config),
            users: UserStore::new(),
            orgs: OrgRegistry::new(),
            connections: Arc::new(connections),
            db,
        })
    }
}
