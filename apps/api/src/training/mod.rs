//! Training courses and registrations.

pub mod handlers;
pub mod service;

pub use service::TrainingService;
