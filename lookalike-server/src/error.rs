//! HTTP error type
//!
//! Every handler returns `Result<_, ApiError>`. The response body is always
//! `{"error": <message>, "code": <CODE>}`; internal details only reach the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lookalike_core::LookalikeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is unusable (missing field, bad content type, ...).
    /// The message is shown to the client as is.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side failure unrelated to the upload.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Lookalike(#[from] LookalikeError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Lookalike(
                LookalikeError::InvalidImage(_) | LookalikeError::InvalidFingerprint(_),
            ) => StatusCode::BAD_REQUEST,
            Self::Lookalike(LookalikeError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Lookalike(
                LookalikeError::FingerprintLengthMismatch { .. } | LookalikeError::Io(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code sent alongside the message.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Lookalike(e) => match e {
                LookalikeError::InvalidImage(_) => "INVALID_IMAGE",
                LookalikeError::InvalidFingerprint(_) => "INVALID_FINGERPRINT",
                LookalikeError::FingerprintLengthMismatch { .. } => "FINGERPRINT_MISMATCH",
                LookalikeError::Store(_) => "STORE_UNAVAILABLE",
                LookalikeError::Io(_) => "IO_ERROR",
            },
        }
    }

    fn client_message(&self) -> String {
        let message = match self {
            Self::BadRequest(message) => return message.clone(),
            Self::Internal(_) => "Internal server error",
            Self::Lookalike(LookalikeError::InvalidImage(_)) => "Failed to process image",
            Self::Lookalike(LookalikeError::InvalidFingerprint(_)) => "Invalid fingerprint",
            Self::Lookalike(LookalikeError::FingerprintLengthMismatch { .. }) => {
                "Fingerprint comparison failed"
            }
            Self::Lookalike(LookalikeError::Store(_)) => "Corpus store unavailable",
            Self::Lookalike(LookalikeError::Io(_)) => "Internal server error",
        };
        message.to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %detail, "Request failed");
        } else {
            tracing::warn!(status = %status, code, error = %detail, "Request rejected");
        }

        let body = serde_json::json!({
            "error": self.client_message(),
            "code": code,
        });
        (status, Json(body)).into_response()
    }
}
