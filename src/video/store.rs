//! Video directory store
//!
//! A flat directory is the only record of stored videos: existence, size and
//! modification time all come from the filesystem at request time.

use chrono::{DateTime, Local};
use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

use super::lock::{Lease, VideoLocks};
use crate::config::{SniffPolicy, StorageConfig};
use crate::error::AppError;
use crate::http::mime;
use crate::http::StreamSource;
use crate::logger;

/// Route prefix under which stored videos are served
pub const VIDEO_URL_PREFIX: &str = "/api/video/";

/// A video file on disk with its derived metadata
#[derive(Debug, Clone, Serialize)]
pub struct StoredVideo {
    pub filename: String,
    pub size: u64,
    #[serde(serialize_with = "serialize_local_time")]
    pub uploaded_at: DateTime<Local>,
    pub content_type: &'static str,
    pub url: String,
}

fn serialize_local_time<S: Serializer>(t: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format("%Y-%m-%d %H:%M:%S"))
}

impl StoredVideo {
    pub(super) fn from_metadata(filename: String, meta: &Metadata) -> Self {
        let uploaded_at = meta
            .modified()
            .map_or_else(|_| Local::now(), DateTime::<Local>::from);
        Self {
            url: format!("{VIDEO_URL_PREFIX}{filename}"),
            content_type: mime::video_content_type(&filename),
            size: meta.len(),
            uploaded_at,
            filename,
        }
    }
}

/// Handle on the video directory
#[derive(Debug, Clone)]
pub struct VideoStore {
    pub(super) dir: PathBuf,
    pub(super) max_upload_bytes: u64,
    pub(super) sniff: SniffPolicy,
    locks: VideoLocks,
}

impl VideoStore {
    /// Open (and create if needed) the configured video directory
    pub async fn open(config: &StorageConfig) -> Result<Self, AppError> {
        fs::create_dir_all(&config.video_dir).await?;
        Ok(Self {
            dir: PathBuf::from(&config.video_dir),
            max_upload_bytes: config.max_upload_bytes,
            sniff: config.content_sniff,
            locks: VideoLocks::default(),
        })
    }

    /// List regular files with an allowlisted video extension, newest first
    pub async fn list(&self) -> Result<Vec<StoredVideo>, AppError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut videos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !mime::is_video_file(&name) {
                continue;
            }
            match entry.metadata().await {
                Ok(meta) if meta.is_file() => videos.push(StoredVideo::from_metadata(name, &meta)),
                Ok(_) => {}
                Err(e) => logger::log_warning(&format!("Skipping {name}: {e}")),
            }
        }
        videos.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.filename.cmp(&b.filename)));
        Ok(videos)
    }

    /// Check an existing video by name: traversal guard, presence, regular
    /// file, video extension. Returns the decoded name and its path.
    pub async fn resolve(&self, raw_name: &str) -> Result<(String, PathBuf), AppError> {
        let name = validate_name(raw_name)?;
        let path = self.dir.join(&name);
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::not_found(format!("video {name} not found")));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Err(AppError::validation(format!("{name} is a directory")));
        }
        if !mime::is_video_file(&name) {
            return Err(AppError::validation(format!("{name} is not a video file")));
        }
        Ok((name, path))
    }

    /// Open a video for streaming together with a read lease on its name
    pub async fn open_stream(&self, raw_name: &str) -> Result<(StreamSource, Lease), AppError> {
        let (name, path) = self.resolve(raw_name).await?;
        let lease = self
            .locks
            .acquire(&name)
            .ok_or_else(|| AppError::not_found(format!("video {name} is being deleted")))?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::not_found(format!("video {name} not found")));
            }
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;
        let source = StreamSource {
            file,
            total_size: meta.len(),
            modified: meta.modified()?,
            content_type: mime::video_content_type(&name),
        };
        Ok((source, lease))
    }

    /// Delete a stored video; refused while a stream is reading it
    pub async fn delete(&self, raw_name: &str) -> Result<String, AppError> {
        let (name, path) = self.resolve(raw_name).await?;
        let Some(_guard) = self.locks.begin_delete(&name) else {
            return Err(AppError::Conflict(format!("video {name} is currently being streamed")));
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(name),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::not_found(format!("video {name} not found")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Traversal guard for user-supplied filenames
///
/// The name is percent-decoded first so `..%2Fetc` is caught too.
pub fn validate_name(raw: &str) -> Result<String, AppError> {
    let name = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| AppError::validation("filename is not valid UTF-8"))?;
    if name.is_empty() {
        return Err(AppError::validation("filename is required"));
    }
    if name.contains("..") || name.contains(['/', '\\', '\0']) {
        return Err(AppError::validation(format!("invalid filename: {name}")));
    }
    Ok(name.into_owned())
}
