//! File streaming responder
//!
//! Turns an open file plus a `RangeOutcome` into a 200, 206 or 416 response
//! whose body is read from disk in fixed-size chunks, so memory use does not
//! depend on the size of the requested range.

use futures_util::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{Response, StatusCode};
use std::io::SeekFrom;
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::cache;
use super::range::RangeOutcome;
use super::response::{build_304_response, build_416_response, empty, log_build_error, ResponseBody};
use crate::logger;

/// Read size for streamed bodies
pub const CHUNK_SIZE: usize = 64 * 1024;

/// An open file and the metadata needed to describe it
pub struct StreamSource {
    pub file: File,
    pub total_size: u64,
    pub modified: SystemTime,
    pub content_type: &'static str,
}

/// Conditional request headers, consulted for whole-file responses only
#[derive(Debug, Default, Clone, Copy)]
pub struct Preconditions<'a> {
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
}

/// Build the response for `source` according to `outcome`
///
/// Errors only come from seeking before any byte is sent. Once the body is
/// streaming, a failed read ends the transfer and is logged.
pub async fn respond(
    mut source: StreamSource,
    outcome: RangeOutcome,
    preconditions: Preconditions<'_>,
    is_head: bool,
) -> std::io::Result<Response<ResponseBody>> {
    let etag = cache::file_etag(source.total_size, source.modified);

    let builder = Response::builder()
        .header("Content-Type", source.content_type)
        .header("Accept-Ranges", "bytes")
        .header("Last-Modified", cache::http_date(source.modified))
        .header("ETag", &etag);

    let (builder, body) = match outcome {
        RangeOutcome::Unsatisfiable => return Ok(build_416_response(source.total_size)),
        RangeOutcome::Whole => {
            if cache::is_not_modified(
                preconditions.if_none_match,
                preconditions.if_modified_since,
                &etag,
                source.modified,
            ) {
                return Ok(build_304_response(&etag));
            }
            let body = if is_head {
                empty()
            } else {
                file_body(source.file, source.total_size)
            };
            let builder = builder
                .status(StatusCode::OK)
                .header("Content-Length", source.total_size);
            (builder, body)
        }
        RangeOutcome::Partial { start, end } => {
            let len = end - start + 1;
            let body = if is_head {
                empty()
            } else {
                source.file.seek(SeekFrom::Start(start)).await?;
                file_body(source.file, len)
            };
            let builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header("Content-Length", len)
                .header(
                    "Content-Range",
                    format!("bytes {start}-{end}/{}", source.total_size),
                );
            (builder, body)
        }
    };

    Ok(builder.body(body).unwrap_or_else(|e| {
        log_build_error("stream", &e);
        Response::new(empty())
    }))
}

/// Stream exactly `len` bytes from the file's current position
fn file_body(file: File, len: u64) -> ResponseBody {
    let stream = ReaderStream::with_capacity(file.take(len), CHUNK_SIZE)
        .inspect_err(|e| logger::log_warning(&format!("Transfer aborted: {e}")))
        .map_ok(Frame::data);
    StreamBody::new(stream).boxed_unsync()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn source_for(data: &[u8]) -> (tempfile::TempDir, StreamSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, data).await.unwrap();
        let file = File::open(&path).await.unwrap();
        let meta = file.metadata().await.unwrap();
        let source = StreamSource {
            file,
            total_size: meta.len(),
            modified: meta.modified().unwrap(),
            content_type: "video/mp4",
        };
        (dir, source)
    }

    async fn body_of(resp: Response<ResponseBody>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_whole_file() {
        let data = sample(200_000);
        let (_dir, source) = source_for(&data).await;
        let resp = respond(source, RangeOutcome::Whole, Preconditions::default(), false)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Length"], "200000");
        assert_eq!(resp.headers()["Accept-Ranges"], "bytes");
        assert_eq!(body_of(resp).await.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_partial_spanning_chunks() {
        let data = sample(300_000);
        let (_dir, source) = source_for(&data).await;
        let outcome = RangeOutcome::Partial { start: 1000, end: 150_000 };
        let resp = respond(source, outcome, Preconditions::default(), false)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()["Content-Length"], "149001");
        assert_eq!(resp.headers()["Content-Range"], "bytes 1000-150000/300000");
        assert_eq!(body_of(resp).await.as_ref(), &data[1000..=150_000]);
    }

    #[tokio::test]
    async fn test_unsatisfiable() {
        let (_dir, source) = source_for(&sample(10)).await;
        let resp = respond(source, RangeOutcome::Unsatisfiable, Preconditions::default(), false)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()["Content-Range"], "bytes */10");
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_has_headers_but_no_body() {
        let (_dir, source) = source_for(&sample(100)).await;
        let outcome = RangeOutcome::Partial { start: 10, end: 19 };
        let resp = respond(source, outcome, Preconditions::default(), true)
            .await
            .unwrap();
        assert_eq!(resp.headers()["Content-Length"], "10");
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_if_none_match_returns_304() {
        let (_dir, source) = source_for(&sample(100)).await;
        let etag = cache::file_etag(source.total_size, source.modified);
        let pre = Preconditions {
            if_none_match: Some(etag.as_str()),
            if_modified_since: None,
        };
        let resp = respond(source, RangeOutcome::Whole, pre, false).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    }
}
