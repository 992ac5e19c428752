//! One resume per account, cached by account.

pub mod handlers;
pub mod service;

pub use service::ResumeService;
