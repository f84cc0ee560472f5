//! Salesforce org connections: OAuth plumbing and the per-org connection
//! lifecycle manager.

pub mod manager;
pub mod oauth;

pub use manager::{ConnectionDetails, OrgConnectionManager};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SfdcError {
    #[error("orgId is required")]
    OrgIdRequired,

    /// The refresh token is invalid or expired; the org must re-authorize.
    #[error("Salesforce session expired")]
    SessionExpired,

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
