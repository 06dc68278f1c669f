use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness payload. `status` degrades when the agenda store is unreachable —
/// every operation in this service is a read-modify-write against Postgres,
/// so an API that cannot reach its store is not healthy.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    /// Which service answered (useful behind a shared ingress)
    pub service: String,
    pub version: String,
}

/// Health check endpoint — verifies both API and agenda store are operational
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };
    let http_status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::HealthResponse;

    #[test]
    fn health_payload_names_the_service() {
        let json = serde_json::to_value(HealthResponse {
            status: "ok".to_string(),
            service: "pacer-api".to_string(),
            version: "0.1.0".to_string(),
        })
        .unwrap();
        assert_eq!(json["service"], "pacer-api");
        assert_eq!(json["status"], "ok");
    }
}
