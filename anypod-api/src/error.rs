use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use anypod_core::error::{Error, ExtractorErrorKind};

pub type AppResult<T> = Result<T, AppError>;

/// An HTTP-layer error carrying the status code and the structured context
/// admin callers get back in the response body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
    pub feed_id: Option<String>,
    pub download_id: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self { status, error_code, message: message.into(), feed_id: None, download_id: None }
    }

    #[must_use]
    pub fn with_feed(mut self, feed_id: impl Into<String>) -> Self {
        self.feed_id = Some(feed_id.into());
        self
    }

    #[must_use]
    pub fn with_download(mut self, download_id: impl Into<String>) -> Self {
        self.download_id = Some(download_id.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "illegal_transition", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "content_type_rejected", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Serialize)]
struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    feed_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error_code: &'static str,
    message: String,
    context: ErrorContext,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorBody {
            error_code: self.error_code,
            message: self.message,
            context: ErrorContext { feed_id: self.feed_id, download_id: self.download_id },
        });
        (status, body).into_response()
    }
}

/// Maps the domain error taxonomy onto the HTTP status codes from the
/// admin-surface error contract: 400 validation, 404 missing, 409 illegal
/// transition, 422 content-type issues, 500 for everything else.
impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidIdentifier { kind, value, reason } => {
                Self::bad_request(format!("invalid {kind} {value:?}: {reason}"))
            }
            Error::NotFound(msg) => Self::not_found(msg),
            Error::IllegalTransition(msg) => Self::conflict(msg),
            Error::Extractor(ExtractorErrorKind::ItemFiltered) => {
                Self::unprocessable("item is not a downloadable VOD (live or upcoming)")
            }
            Error::Extractor(kind) => {
                tracing::error!(error = %kind, "extractor error surfaced to HTTP layer");
                Self::internal("extractor error")
            }
            Error::Configuration(msg) => {
                tracing::error!(error = %msg, "configuration error surfaced to HTTP layer");
                Self::internal("configuration error")
            }
            Error::DataIntegrity { entity, reason } => {
                tracing::error!(entity = %entity, reason = %reason, "data integrity error surfaced to HTTP layer");
                Self::internal("data integrity error")
            }
            Error::Persistence(msg) => {
                tracing::error!(error = %msg, "persistence error surfaced to HTTP layer");
                Self::internal("persistence error")
            }
            Error::Filesystem(msg) => {
                tracing::error!(error = %msg, "filesystem error surfaced to HTTP layer");
                Self::internal("filesystem error")
            }
        }
    }
}
