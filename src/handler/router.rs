//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method and path matching, CORS,
//! access logging, and rendering of `AppError`s.

use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, IF_NONE_MATCH};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use super::{static_files, users, video, BoxError};
use crate::config::AppState;
use crate::error::AppError;
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use crate::video::VIDEO_URL_PREFIX;

const DELETE_PREFIX: &str = "/api/delete-video/";

/// Methods accepted on a known API path, `None` for unknown paths
fn allowed_methods(path: &str) -> Option<&'static str> {
    if path.starts_with(VIDEO_URL_PREFIX) {
        return Some("GET, HEAD, OPTIONS");
    }
    if path.starts_with(DELETE_PREFIX) {
        return Some("DELETE, OPTIONS");
    }
    match path {
        "/api/videos" | "/api/health" => Some("GET, HEAD, OPTIONS"),
        "/api/upload-video" | "/api/upload-csv" | "/api/send-csv-email" => Some("POST, OPTIONS"),
        "/api/users" => Some("GET, POST, OPTIONS"),
        "/api/export-csv" => Some("GET, OPTIONS"),
        _ => None,
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let access_log = state.cached_access_log.load(Ordering::Relaxed);
    let entry = access_log.then(|| access_entry(&req, peer));
    let is_api = req.uri().path().starts_with("/api/");

    let mut response = match route(req, &state).await {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    };

    if is_api && state.config.http.enable_cors {
        response
            .headers_mut()
            .entry(ACCESS_CONTROL_ALLOW_ORIGIN)
            .or_insert(HeaderValue::from_static("*"));
    }
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(hyper::header::SERVER, server);
    }

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn access_entry<B>(req: &Request<B>, peer: SocketAddr) -> AccessLogEntry {
    let header = |name: hyper::header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    let mut entry = AccessLogEntry::new(
        peer.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header(hyper::header::REFERER);
    entry.user_agent = header(hyper::header::USER_AGENT);
    entry
}

/// Dispatch by method and path
async fn route<B>(req: Request<B>, state: &AppState) -> Result<Response<ResponseBody>, AppError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if !path.starts_with("/api/") {
        return match method {
            Method::GET | Method::HEAD => {
                let if_none_match = req
                    .headers()
                    .get(IF_NONE_MATCH)
                    .and_then(|v| v.to_str().ok());
                static_files::serve_spa(
                    &state.config.http.static_dir,
                    &path,
                    if_none_match,
                    method == Method::HEAD,
                )
                .await
            }
            Method::OPTIONS => Ok(http::build_options_response(
                "GET, HEAD, OPTIONS",
                state.config.http.enable_cors,
            )),
            _ => Err(AppError::MethodNotAllowed),
        };
    }

    let Some(allow) = allowed_methods(&path) else {
        return Err(AppError::not_found(format!("no route for {path}")));
    };
    if method == Method::OPTIONS {
        return Ok(http::build_options_response(allow, state.config.http.enable_cors));
    }

    if let Some(name) = path.strip_prefix(VIDEO_URL_PREFIX) {
        return match method {
            Method::GET | Method::HEAD => video::serve(&req, name, state).await,
            _ => Err(AppError::MethodNotAllowed),
        };
    }
    if let Some(name) = path.strip_prefix(DELETE_PREFIX) {
        return match method {
            Method::DELETE => video::delete(name, state).await,
            _ => Err(AppError::MethodNotAllowed),
        };
    }

    match (method, path.as_str()) {
        (Method::GET | Method::HEAD, "/api/videos") => video::list(state).await,
        (Method::POST, "/api/upload-video") => video::upload(req, state).await,
        (Method::GET, "/api/users") => users::list(state).await,
        (Method::POST, "/api/users") => users::create(req, state).await,
        (Method::POST, "/api/upload-csv") => users::upload_csv(req, state).await,
        (Method::GET, "/api/export-csv") => users::export_csv(state).await,
        (Method::POST, "/api/send-csv-email") => users::send_csv_email(state).await,
        (Method::GET | Method::HEAD, "/api/health") => Ok(users::health(state)),
        _ => Err(AppError::MethodNotAllowed),
    }
}
