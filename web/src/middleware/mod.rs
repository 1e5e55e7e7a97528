pub mod access_log;
pub mod auth;
pub mod cors;
