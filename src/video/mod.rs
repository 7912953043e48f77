//! Video storage module
//!
//! The on-disk video directory: listing, lookup, streaming leases, deletion
//! and upload ingestion.

mod ingest;
mod lock;
mod store;

pub use lock::{DeleteGuard, Lease, VideoLocks};
pub use store::{validate_name, StoredVideo, VideoStore, VIDEO_URL_PREFIX};
