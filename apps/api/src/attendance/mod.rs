//! Clock-in / clock-out and attendance reporting.

pub mod handlers;
pub mod policy;
pub mod service;

pub use policy::AttendancePolicy;
pub use service::AttendanceService;
