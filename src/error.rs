use std::borrow::Cow;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// A single field-attributed validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: Cow<'static, str>,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to API callers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Access denied")]
    AuthorizationDenied,

    #[error("User not found")]
    NotFound,

    #[error("Validation failed")]
    ValidationFailed(Vec<Violation>),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::ValidationFailed(vec![Violation::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::AuthorizationDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Field name used when a body error cannot be tied to a single field.
pub const BODY_FIELD: &str = "body";

/// Splits axum's `"<prefix>: <path>: <message>"` data-error text into the
/// serde field path and the message. Root-level errors map to [`BODY_FIELD`].
fn data_error_violation(text: &str) -> Violation {
    let detail = text.split_once(": ").map_or(text, |(_, rest)| rest);
    match detail.split_once(": ") {
        Some((path, message)) if !path.is_empty() && path != "." && !path.contains(' ') => {
            Violation::new(path.to_string(), message)
        }
        _ => Violation::new(BODY_FIELD, detail),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let violation = match &rejection {
            JsonRejection::JsonDataError(e) => data_error_violation(&e.body_text()),
            JsonRejection::JsonSyntaxError(_) => {
                Violation::new(BODY_FIELD, "Request body is not valid JSON.")
            }
            JsonRejection::MissingJsonContentType(_) => {
                Violation::new(BODY_FIELD, "Expected `Content-Type: application/json`.")
            }
            other => Violation::new(BODY_FIELD, other.body_text()),
        };
        warn!(field = %violation.field, error = %violation.message, "rejected request body");
        ApiError::ValidationFailed(vec![violation])
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let violations = match self {
            ApiError::ValidationFailed(v) => v,
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                Vec::new()
            }
            _ => Vec::new(),
        };

        (status, Json(ErrorResponse { error, violations })).into_response()
    }
}
