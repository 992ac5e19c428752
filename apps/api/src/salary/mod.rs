//! Monthly salary records.

pub mod handlers;
pub mod service;

pub use service::SalaryService;
