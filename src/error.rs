//! Error types module
//!
//! Every request-scoped failure is an `AppError`. Handlers return
//! `Result<_, AppError>` and the router renders the error as a JSON body with
//! the matching status code, so no error here is fatal to the process.

use hyper::{Response, StatusCode};

use crate::http::response::{json_error, ResponseBody};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed input: bad filename, bad JSON, missing multipart field
    #[error("{0}")]
    Validation(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    NotFound(String),

    #[error("payload too large (max {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    #[error("{0}")]
    Conflict(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("multipart error: {0}")]
    Multipart(#[from] multer::Error),

    #[error("mail error: {0}")]
    Mail(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Multipart(multer::Error::StreamReadFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::UnsupportedFormat(_) | Self::Csv(_) | Self::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Io(_) | Self::Database(_) | Self::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as a JSON error response, logging at a level matching the status
    pub fn into_response(self) -> Response<ResponseBody> {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            crate::logger::log_error(&message);
        } else {
            crate::logger::log_warning(&format!("{} {message}", status.as_u16()));
        }
        json_error(status, &message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UnsupportedFormat("txt".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Io(std::io::Error::other("disk")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_multipart_read_failure_is_server_error() {
        let read_failed =
            multer::Error::StreamReadFailed(Box::new(std::io::Error::other("connection reset")));
        assert_eq!(
            AppError::from(read_failed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(multer::Error::IncompleteStream).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_into_response_sets_status() {
        let resp = AppError::PayloadTooLarge { limit: 10 }.into_response();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }
}
