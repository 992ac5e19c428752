//! Accounts: registration, login, profiles and role assignment.

pub mod handlers;
pub mod service;

pub use service::AccountService;
