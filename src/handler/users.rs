//! Users endpoints, CSV import/export, backup mail and health

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

use crate::config::AppState;
use crate::error::AppError;
use crate::http::response::{full, log_build_error};
use crate::http::{self, ResponseBody};
use crate::users::{csv, NewUser};

use super::BoxError;

#[derive(Serialize)]
struct RowsResponse {
    status: &'static str,
    message: &'static str,
    rows: usize,
}

fn to_usize(limit: u64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Buffer a request body, refusing anything over `limit` bytes
pub(super) async fn collect_limited<B>(body: B, limit: u64) -> Result<Bytes, AppError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, to_usize(limit)).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(AppError::PayloadTooLarge { limit }),
        Err(e) => Err(AppError::validation(format!("failed to read request body: {e}"))),
    }
}

/// `GET /api/users`
pub async fn list(state: &AppState) -> Result<Response<ResponseBody>, AppError> {
    let users = state.users.list().await?;
    Ok(http::json_response(StatusCode::OK, &users))
}

/// `POST /api/users` with `{"name": ...}`
pub async fn create<B>(req: Request<B>, state: &AppState) -> Result<Response<ResponseBody>, AppError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let body = collect_limited(req.into_body(), state.config.http.max_body_size).await?;
    let input: NewUser = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation(format!("invalid JSON: {e}")))?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("field 'name' is required"));
    }
    let user = state.users.create(name).await?;
    Ok(http::json_response(StatusCode::CREATED, &user))
}

/// CSV payload of an import: multipart field `file`, or the raw body
async fn read_csv_payload<B>(req: Request<B>, limit: u64) -> Result<Bytes, AppError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| ct.starts_with("multipart/"))
        .map(multer::parse_boundary)
        .transpose()?;
    let Some(boundary) = boundary else {
        return collect_limited(req.into_body(), limit).await;
    };

    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(limit));
    let mut multipart =
        multer::Multipart::with_constraints(req.into_body().into_data_stream(), boundary, constraints);
    let too_large = |e: multer::Error| match e {
        multer::Error::StreamSizeExceeded { .. } => AppError::PayloadTooLarge { limit },
        other => other.into(),
    };
    while let Some(field) = multipart.next_field().await.map_err(too_large)? {
        if field.name() == Some("file") {
            return field.bytes().await.map_err(too_large);
        }
    }
    Err(AppError::validation("multipart field 'file' is missing"))
}

/// `POST /api/upload-csv`: replace the users table
pub async fn upload_csv<B>(req: Request<B>, state: &AppState) -> Result<Response<ResponseBody>, AppError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let data = read_csv_payload(req, state.config.http.max_body_size).await?;
    let users = csv::parse_users(&data)?;
    let rows = state.users.replace_all(&users).await?;
    crate::logger::log_info(&format!("Users table replaced from CSV ({rows} rows)"));
    Ok(http::json_response(
        StatusCode::CREATED,
        &RowsResponse {
            status: "success",
            message: "users table replaced from CSV",
            rows,
        },
    ))
}

/// `GET /api/export-csv`
pub async fn export_csv(state: &AppState) -> Result<Response<ResponseBody>, AppError> {
    let users = state.users.list().await?;
    let data = csv::write_users(&users)?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(CONTENT_DISPOSITION, "attachment; filename=\"users.csv\"")
        .header("Content-Length", data.len())
        .body(full(data))
        .unwrap_or_else(|e| {
            log_build_error("CSV", &e);
            Response::new(http::response::empty())
        }))
}

/// `POST /api/send-csv-email`
pub async fn send_csv_email(state: &AppState) -> Result<Response<ResponseBody>, AppError> {
    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| AppError::Mail("SMTP is not configured".to_string()))?;
    let rows = mailer.send_backup(state.users.as_ref()).await?;
    Ok(http::json_response(
        StatusCode::OK,
        &RowsResponse {
            status: "success",
            message: "CSV backup sent by e-mail",
            rows,
        },
    ))
}

/// `GET /api/health`
pub fn health(state: &AppState) -> Response<ResponseBody> {
    http::json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "service": state.config.http.server_name,
            "timestamp": chrono::Local::now().to_rfc3339(),
        }),
    )
}
