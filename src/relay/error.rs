use crate::config::ErrorShape;
use crate::types::ErrorResponse;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub const METHOD_NOT_ALLOWED_BODY: &str = "Method Not Allowed";

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Missing API key in server configuration")]
    MissingCredential,

    #[error("Failed to read request body: {message}")]
    BodyRead { message: String },

    #[error("Invalid JSON payload: {source}")]
    InvalidJson { source: serde_json::Error },

    #[error("Cannot read prompt from a null request body")]
    NullBody,

    /// `source` must have its URL stripped; the URL carries the key.
    #[error("Upstream request failed: {source}")]
    UpstreamFailed { source: reqwest::Error },

    #[error("Upstream returned invalid JSON: {source}")]
    UpstreamDecode { source: serde_json::Error },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl RelayError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Only a wrong method is reported as such; every local fault is a 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::MissingCredential
            | RelayError::BodyRead { .. }
            | RelayError::InvalidJson { .. }
            | RelayError::NullBody
            | RelayError::UpstreamFailed { .. }
            | RelayError::UpstreamDecode { .. }
            | RelayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed => "method_not_allowed",
            RelayError::MissingCredential => "missing_credential",
            RelayError::BodyRead { .. } => "body_read",
            RelayError::InvalidJson { .. } => "invalid_json",
            RelayError::NullBody => "null_body",
            RelayError::UpstreamFailed { .. } => "upstream_failed",
            RelayError::UpstreamDecode { .. } => "upstream_decode",
            RelayError::Internal { .. } => "internal",
        }
    }

    pub fn into_response_with(self, shape: ErrorShape) -> Response {
        let status = self.status_code();

        if let RelayError::MethodNotAllowed = self {
            return (status, [(header::ALLOW, "POST")], METHOD_NOT_ALLOWED_BODY).into_response();
        }

        let error_response = ErrorResponse::new(shape, self.to_string());
        (status, Json(error_response)).into_response()
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.into_response_with(ErrorShape::default())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
