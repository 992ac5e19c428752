//! Local file storage for resume attachments and other uploads.

pub mod handlers;
pub mod store;

pub use store::UploadStore;
