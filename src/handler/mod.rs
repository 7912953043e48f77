//! Request handler module
//!
//! Routing dispatch plus the video, users and front-end handlers.

pub mod router;
pub mod static_files;
pub mod users;
pub mod video;

/// Error bound accepted for request bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Re-export main entry point
pub use router::handle_request;
