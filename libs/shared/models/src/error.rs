use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Fixed error-code vocabulary used in field-keyed error entries.
/// These codes are a contract surface consumed by clients.
pub mod codes {
    /// A unique field (e.g. email) already holds this value.
    pub const DUPLICATE_UNIQUE: &str = "E001";
    /// Credentials did not validate.
    pub const INVALID_CREDENTIALS: &str = "E002";
    /// The value must be a date strictly in the future.
    pub const FUTURE_DATE_REQUIRED: &str = "E003";
    /// The referenced entity does not exist.
    pub const REFERENCE_NOT_FOUND: &str = "E004";
    /// Unspecified validation failure; carries a human-readable message.
    pub const UNSPECIFIED: &str = "E999";
}

/// One entry of the structured `errors` list in an error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldError {
    pub fn coded(code: &str, field: &str) -> Self {
        Self {
            code: code.to_string(),
            field: field.to_string(),
            message: None,
        }
    }

    pub fn with_message(code: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            field: field.to_string(),
            message: Some(message.into()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Eligibility error: {message}")]
    Eligibility {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn eligibility(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        AppError::Eligibility {
            message: message.into(),
            errors,
        }
    }
}

// Extractor rejections (malformed bodies, non-UUID path segments,
// unparseable query values) are wrapped so they surface the same error
// envelope as domain failures instead of axum's plain-text default.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg, vec![]),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, vec![]),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, vec![]),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, vec![]),
            AppError::Validation { message, errors } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, errors)
            }
            AppError::Eligibility { message, errors } => {
                (StatusCode::BAD_REQUEST, message, errors)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, vec![]),
            AppError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, vec![]),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "status": "error",
            "code": status.as_u16(),
            "message": message,
            "errors": errors,
        }));

        (status, body).into_response()
    }
}
