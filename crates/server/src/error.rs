//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Rejection reasons for an HKP key submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HkpStatus {
    MismatchFingerprint,
    MissingSignature,
    OutOfDate,
}

impl HkpStatus {
    /// Value of the `X-HKP-Status` response header.
    pub fn header_value(self) -> &'static str {
        match self {
            Self::MismatchFingerprint => "Mismatch fingerprint",
            Self::MissingSignature => "Missing signature",
            Self::OutOfDate => "out of date",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Self::MismatchFingerprint => "ERR FINGERPRINT",
            Self::MissingSignature => "ERR SIGNATURE",
            Self::OutOfDate => "ERR OUT OF DATE",
        }
    }
}

/// API error type for the non-page endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("key submission rejected")]
    Hkp(HkpStatus),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Hkp(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Hkp(reason) => (
                status,
                [
                    ("X-HKP-Status", reason.header_value()),
                    ("Content-Type", "text/plain"),
                ],
                reason.body(),
            )
                .into_response(),
            other => (
                status,
                [("Content-Type", "text/plain")],
                other.to_string(),
            )
                .into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
