use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;

pub mod agenda;
pub mod calendar;
pub mod health;

/// Temporary: extract user_id from header until auth is implemented.
/// In production, this comes from the authenticated session's user.
pub(crate) fn extract_user_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let header_val = headers
        .get("x-user-id")
        .ok_or_else(|| AppError::Validation {
            message: "x-user-id header is required (temporary, will be replaced by auth)"
                .to_string(),
            field: Some("headers.x-user-id".to_string()),
            received: None,
            docs_hint: Some(
                "Pass x-user-id as a UUID header. This is temporary until session auth is implemented."
                    .to_string(),
            ),
        })?;

    let user_id_str = header_val.to_str().map_err(|_| AppError::Validation {
        message: "x-user-id must be a valid UTF-8 string".to_string(),
        field: Some("headers.x-user-id".to_string()),
        received: None,
        docs_hint: None,
    })?;

    Uuid::parse_str(user_id_str).map_err(|_| AppError::Validation {
        message: "x-user-id must be a valid UUID".to_string(),
        field: Some("headers.x-user-id".to_string()),
        received: Some(serde_json::Value::String(user_id_str.to_string())),
        docs_hint: Some(
            "Use a valid UUIDv4 or UUIDv7, e.g. 'a1b2c3d4-e5f6-7890-abcd-ef1234567890'".to_string(),
        ),
    })
}
