//! Video endpoints: list, stream, upload, delete

use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderValue, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, RANGE,
};
use hyper::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde::Serialize;

use crate::config::AppState;
use crate::error::AppError;
use crate::http::{self, parse_range, Preconditions, RangeOptions, ResponseBody};
use crate::video::{validate_name, StoredVideo};

use super::BoxError;

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    message: &'static str,
    #[serde(flatten)]
    video: StoredVideo,
}

fn header<'a, B>(req: &'a Request<B>, name: hyper::header::HeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// `GET /api/videos`
pub async fn list(state: &AppState) -> Result<Response<ResponseBody>, AppError> {
    let videos = state.videos.list().await?;
    Ok(http::json_response(StatusCode::OK, &videos))
}

/// `GET|HEAD /api/video/{filename}`
///
/// The read lease taken here travels with the response body, so a delete
/// issued mid-stream is refused until the client is done.
pub async fn serve<B>(
    req: &Request<B>,
    raw_name: &str,
    state: &AppState,
) -> Result<Response<ResponseBody>, AppError> {
    let name = validate_name(raw_name)?;
    let (source, lease) = state.videos.open_stream(raw_name).await?;

    let outcome = parse_range(
        header(req, RANGE),
        source.total_size,
        RangeOptions {
            legacy_zero_end: state.config.http.legacy_zero_end_range,
        },
    );
    tracing::debug!(video = %name, range = ?header(req, RANGE), outcome = ?outcome, "serving video");

    let preconditions = Preconditions {
        if_none_match: header(req, IF_NONE_MATCH),
        if_modified_since: header(req, IF_MODIFIED_SINCE),
    };
    let is_head = req.method() == Method::HEAD;
    let response = http::respond(source, outcome, preconditions, is_head).await?;

    let (mut parts, body) = response.into_parts();
    let disposition = format!("inline; filename=\"{}\"", name.replace('"', "'"));
    if let Ok(value) = HeaderValue::from_bytes(disposition.as_bytes()) {
        parts.headers.insert(CONTENT_DISPOSITION, value);
    }
    parts
        .headers
        .insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
    Ok(Response::from_parts(parts, lease.attach(body)))
}

/// `POST /api/upload-video` with the file in multipart field `video`
pub async fn upload<B>(req: Request<B>, state: &AppState) -> Result<Response<ResponseBody>, AppError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let content_type = header(&req, CONTENT_TYPE)
        .ok_or_else(|| AppError::validation("expected a multipart/form-data body"))?;
    let boundary = multer::parse_boundary(content_type)?;

    let mut multipart = multer::Multipart::new(req.into_body().into_data_stream(), boundary);
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("video") {
            continue;
        }
        let declared = field
            .file_name()
            .map(ToString::to_string)
            .ok_or_else(|| AppError::validation("field 'video' carries no filename"))?;
        let video = state.videos.ingest(field, &declared).await?;
        return Ok(http::json_response(
            StatusCode::OK,
            &UploadResponse {
                status: "success",
                message: "video uploaded",
                video,
            },
        ));
    }
    Err(AppError::validation("multipart field 'video' is missing"))
}

/// `DELETE /api/delete-video/{filename}`
pub async fn delete(raw_name: &str, state: &AppState) -> Result<Response<ResponseBody>, AppError> {
    let name = state.videos.delete(raw_name).await?;
    crate::logger::log_info(&format!("Deleted video {name}"));
    Ok(http::json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "success",
            "message": format!("video {name} deleted"),
        }),
    ))
}
