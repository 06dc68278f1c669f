use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pacer_core::error::{self, ApiError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// The requested resource does not exist for this user (404)
    NotFound { resource: &'static str },
    /// The resource already exists and the operation requires it not to (409)
    AlreadyExists { resource: &'static str },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("No {resource} exists for this user"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(format!(
                        "Create the {resource} first, then retry this operation."
                    )),
                },
            ),
            AppError::AlreadyExists { resource } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::ALREADY_EXISTS.to_string(),
                    message: format!("A {resource} already exists for this user"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(format!(
                        "Use the update path to change the existing {resource}, \
                         or reset it before creating a new one."
                    )),
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);

                // Unique-violation on the per-user agenda index
                if let sqlx::Error::Database(ref db_err) = err {
                    if db_err.code().as_deref() == Some("23505") {
                        return AppError::AlreadyExists { resource: "agenda" }.into_response();
                    }
                }

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}
