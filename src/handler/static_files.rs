//! Front-end bundle serving
//!
//! Paths that do not name a file inside the bundle fall back to
//! `index.html`, so client-side routes survive a page reload.

use hyper::body::Bytes;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::AppError;
use crate::http::{self, cache, mime, ResponseBody};
use crate::logger;

const INDEX_FILE: &str = "index.html";

/// Resolve a request path to a file inside `static_dir`
///
/// Returns `None` when the path is missing, a directory, or escapes the
/// bundle, which the caller turns into the index fallback.
async fn resolve_asset(static_root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
    let relative = decoded.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }

    let canonical = fs::canonicalize(static_root.join(relative)).await.ok()?;
    if !canonical.starts_with(static_root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            canonical.display()
        ));
        return None;
    }
    let meta = fs::metadata(&canonical).await.ok()?;
    meta.is_file().then_some(canonical)
}

/// Serve a bundle file, or `index.html` for anything unknown
pub async fn serve_spa(
    static_dir: &str,
    request_path: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Result<Response<ResponseBody>, AppError> {
    let static_root = match fs::canonicalize(static_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{static_dir}': {e}"
            ));
            return Err(AppError::not_found("front-end bundle is not installed"));
        }
    };

    let path = match resolve_asset(&static_root, request_path).await {
        Some(path) => path,
        None => static_root.join(INDEX_FILE),
    };

    let data = match fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("{request_path} not found")));
        }
        Err(e) => return Err(e.into()),
    };

    let etag = cache::generate_etag(&data);
    if cache::check_etag_match(if_none_match, &etag) {
        return Ok(http::build_304_response(&etag));
    }

    let extension = mime::extension_of(&path.to_string_lossy());
    let content_type = mime::asset_content_type(extension.as_deref());
    Ok(http::response::build_cached_response(
        Bytes::from(data),
        content_type,
        &etag,
        is_head,
    ))
}
