//! Credentials, session tokens and the request guards built on them.

pub mod middleware;
pub mod password;
pub mod token;

/// Role name required by administrative routes.
pub const ADMIN_ROLE: &str = "admin";
