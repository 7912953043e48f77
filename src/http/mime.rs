//! MIME type detection module
//!
//! Two tables: the video allowlist used by upload validation and the video
//! endpoints, and a small table of web asset types for the front-end bundle.

/// Fallback used when a stored video has no recognizable extension
pub const DEFAULT_VIDEO_TYPE: &str = "video/mp4";

/// Lowercased extension of a filename, without the dot
///
/// Everything after the last dot of the final path element, so a bare
/// `.mp4` counts as an mp4.
pub fn extension_of(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Classify a filename as one of the accepted video types
///
/// # Examples
/// ```
/// use vidstream::http::mime::classify;
/// assert_eq!(classify("clip.MKV"), Some("video/x-matroska"));
/// assert_eq!(classify("notes.txt"), None);
/// ```
pub fn classify(filename: &str) -> Option<&'static str> {
    match extension_of(filename)?.as_str() {
        "mp4" => Some("video/mp4"),
        "avi" => Some("video/x-msvideo"),
        "mov" => Some("video/quicktime"),
        "wmv" => Some("video/x-ms-wmv"),
        "flv" => Some("video/x-flv"),
        "webm" => Some("video/webm"),
        "mkv" => Some("video/x-matroska"),
        "m4v" => Some("video/x-m4v"),
        "3gp" => Some("video/3gpp"),
        _ => None,
    }
}

/// Whether the filename carries an allowlisted video extension
pub fn is_video_file(filename: &str) -> bool {
    classify(filename).is_some()
}

/// `Content-Type` for a stored video, defaulting to mp4
pub fn video_content_type(filename: &str) -> &'static str {
    classify(filename).unwrap_or(DEFAULT_VIDEO_TYPE)
}

/// `Content-Type` for a front-end asset
pub fn asset_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js" | "mjs") => "application/javascript",
        Some("json" | "map") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("wasm") => "application/wasm",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_table() {
        assert_eq!(classify("a.mp4"), Some("video/mp4"));
        assert_eq!(classify("a.avi"), Some("video/x-msvideo"));
        assert_eq!(classify("a.mov"), Some("video/quicktime"));
        assert_eq!(classify("a.wmv"), Some("video/x-ms-wmv"));
        assert_eq!(classify("a.flv"), Some("video/x-flv"));
        assert_eq!(classify("a.webm"), Some("video/webm"));
        assert_eq!(classify("a.m4v"), Some("video/x-m4v"));
        assert_eq!(classify("a.3gp"), Some("video/3gpp"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("HOLIDAY.MP4"), Some("video/mp4"));
        assert!(is_video_file("x.WebM"));
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(classify("notes.txt"), None);
        assert_eq!(classify("noext"), None);
        assert_eq!(classify(""), None);
        assert_eq!(video_content_type("weird.bin"), DEFAULT_VIDEO_TYPE);
    }

    #[test]
    fn test_extension_of_last_element() {
        assert_eq!(extension_of(".mp4").as_deref(), Some("mp4"));
        assert_eq!(classify(".MP4"), Some("video/mp4"));
        assert_eq!(extension_of("archive.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(extension_of("dir.d/noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn test_asset_types() {
        assert_eq!(asset_content_type(Some("html")), "text/html; charset=utf-8");
        assert_eq!(asset_content_type(Some("js")), "application/javascript");
        assert_eq!(asset_content_type(None), "application/octet-stream");
    }
}
