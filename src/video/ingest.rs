//! Upload ingestion
//!
//! A body stream is copied into a hidden `.{name}.part` file and renamed into
//! place only after every byte is on disk. Any failure on the way drops the
//! partial file.

use bytes::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::store::{StoredVideo, VideoStore};
use crate::config::SniffPolicy;
use crate::error::AppError;
use crate::http::mime;
use crate::logger;

const WRITE_BUFFER: usize = 32 * 1024;
const SNIFF_LEN: usize = 512;
const PROGRESS_EVERY: Duration = Duration::from_secs(5);

/// Removes the temp file unless the upload was committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    const fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    logger::log_warning(&format!(
                        "Failed to remove partial upload {}: {e}",
                        self.path.display()
                    ));
                }
            }
        }
    }
}

/// `{unix seconds}_{8 alphanumerics}.{ext}`
fn generate_name(extension: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{}_{suffix}.{extension}", Utc::now().timestamp())
}

fn check_signature(head: &[u8], policy: SniffPolicy, declared: &str) -> Result<(), AppError> {
    if policy == SniffPolicy::Off {
        return Ok(());
    }
    let detected = infer::get(head);
    if detected.is_some_and(|t| t.matcher_type() == infer::MatcherType::Video) {
        return Ok(());
    }
    let seen = detected.map_or("unknown", |t| t.mime_type());
    match policy {
        SniffPolicy::Enforce => Err(AppError::UnsupportedFormat(format!(
            "{declared} does not look like a video ({seen})"
        ))),
        _ => {
            logger::log_warning(&format!(
                "Upload {declared} has a video extension but content looks like {seen}"
            ));
            Ok(())
        }
    }
}

impl VideoStore {
    /// Store an uploaded video under a freshly generated name
    ///
    /// `declared_filename` only contributes its extension. The body is never
    /// buffered beyond the write buffer and the sniff window.
    pub async fn ingest<S, E>(&self, body: S, declared_filename: &str) -> Result<StoredVideo, AppError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<AppError>,
    {
        if !mime::is_video_file(declared_filename) {
            return Err(AppError::UnsupportedFormat(format!(
                "{declared_filename} is not an accepted video type"
            )));
        }
        let extension = mime::extension_of(declared_filename).unwrap_or_default();

        let (name, file) = self.create_unique(&extension).await?;
        let final_path = self.dir.join(&name);
        let mut partial = PartialFile::new(part_path(&self.dir, &name));
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER, file);

        let limit = self.max_upload_bytes;
        let mut written: u64 = 0;
        let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
        let mut sniffed = false;
        let started = Instant::now();
        let mut last_report = started;

        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<AppError>::into)?;
            written += chunk.len() as u64;
            if written > limit {
                return Err(AppError::PayloadTooLarge { limit });
            }
            if !sniffed {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
                if head.len() == SNIFF_LEN {
                    check_signature(&head, self.sniff, declared_filename)?;
                    sniffed = true;
                }
            }
            writer.write_all(&chunk).await?;

            if last_report.elapsed() >= PROGRESS_EVERY {
                last_report = Instant::now();
                logger::log_info(&format!(
                    "Upload {name}: {written} bytes in {:.1}s",
                    started.elapsed().as_secs_f64()
                ));
            }
        }

        if written == 0 {
            return Err(AppError::validation("uploaded file is empty"));
        }
        if !sniffed {
            check_signature(&head, self.sniff, declared_filename)?;
        }

        writer.flush().await?;
        writer.get_ref().sync_all().await?;
        drop(writer);
        fs::rename(&partial.path, &final_path).await?;
        partial.committed = true;

        logger::log_info(&format!(
            "Stored upload {name} ({written} bytes in {:.1}s)",
            started.elapsed().as_secs_f64()
        ));

        let meta = fs::metadata(&final_path).await?;
        Ok(StoredVideo::from_metadata(name, &meta))
    }

    /// Pick a generated name that is free both as a final file and as a
    /// temp file, creating the temp file exclusively
    async fn create_unique(&self, extension: &str) -> Result<(String, fs::File), AppError> {
        const ATTEMPTS: usize = 8;
        for _ in 0..ATTEMPTS {
            let name = generate_name(extension);
            if fs::try_exists(self.dir.join(&name)).await? {
                continue;
            }
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(part_path(&self.dir, &name))
                .await
            {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Io(std::io::Error::other(
            "could not allocate a unique upload name",
        )))
    }
}

fn part_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.part"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use futures_util::stream;

    async fn store(dir: &Path, limit: u64, sniff: SniffPolicy) -> VideoStore {
        VideoStore::open(&StorageConfig {
            video_dir: dir.to_string_lossy().into_owned(),
            max_upload_bytes: limit,
            content_sniff: sniff,
        })
        .await
        .unwrap()
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, AppError>> {
        let items: Vec<Result<Bytes, AppError>> =
            parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect();
        stream::iter(items)
    }

    fn mp4_header() -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0x18];
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0, 0, 2, 0]);
        data.extend_from_slice(b"isomiso2avc1mp41");
        data.resize(2048, 7);
        data
    }

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_generated_name_shape() {
        let name = generate_name("mkv");
        let (stamp, rest) = name.split_once('_').unwrap();
        assert!(stamp.parse::<i64>().is_ok());
        let (suffix, ext) = rest.split_once('.').unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(ext, "mkv");
    }

    #[tokio::test]
    async fn test_ingest_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1 << 20, SniffPolicy::Off).await;
        let video = store
            .ingest(chunks(&[b"hello ", b"world"]), "Holiday.MP4")
            .await
            .unwrap();
        assert_eq!(video.size, 11);
        assert!(video.filename.ends_with(".mp4"));
        assert_eq!(video.url, format!("/api/video/{}", video.filename));
        assert_eq!(entries(dir.path()), vec![video.filename.clone()]);
        let stored = std::fs::read(dir.path().join(&video.filename)).unwrap();
        assert_eq!(stored, b"hello world");
    }

    #[tokio::test]
    async fn test_ingest_rejects_extension_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1 << 20, SniffPolicy::Off).await;
        let result = store.ingest(chunks(&[b"text"]), "notes.txt").await;
        assert!(matches!(result, Err(AppError::UnsupportedFormat(_))));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_over_limit_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 8, SniffPolicy::Off).await;
        let result = store.ingest(chunks(&[b"12345", b"67890"]), "a.mp4").await;
        assert!(matches!(result, Err(AppError::PayloadTooLarge { limit: 8 })));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_stream_error_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1 << 20, SniffPolicy::Off).await;
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(AppError::validation("client went away")),
        ]);
        let result = store.ingest(body, "a.webm").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1 << 20, SniffPolicy::Off).await;
        let result = store.ingest(chunks(&[]), "a.mp4").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_sniff_enforce() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1 << 20, SniffPolicy::Enforce).await;

        let result = store.ingest(chunks(&[&[b'x'; 1024]]), "fake.mp4").await;
        assert!(matches!(result, Err(AppError::UnsupportedFormat(_))));
        assert!(entries(dir.path()).is_empty());

        let data = mp4_header();
        let (a, b) = data.split_at(100);
        let video = store.ingest(chunks(&[a, b]), "real.mp4").await.unwrap();
        assert_eq!(video.size, 2048);
    }

    #[tokio::test]
    async fn test_sniff_warn_keeps_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1 << 20, SniffPolicy::Warn).await;
        let video = store.ingest(chunks(&[b"plain text"]), "a.mov").await.unwrap();
        assert_eq!(video.size, 10);
    }
}
