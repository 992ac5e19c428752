//! Request pipeline layers that are not tied to credentials.
//! Authentication and admin checks live in `crate::auth::middleware`.

pub mod audit;
pub mod context;
pub mod rate_limit;
