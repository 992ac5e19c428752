//! Notices, their cached active lists and per-account read marks.

pub mod handlers;
pub mod service;

pub use service::NoticeService;
