pub mod accounts;
pub mod auth;
pub mod home;
pub mod orgs;
