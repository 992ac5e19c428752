//! Roles, permissions and the grants between them.

pub mod handlers;
pub mod service;

pub use service::RoleService;
