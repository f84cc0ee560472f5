pub mod account;
pub mod org;
pub mod user;
