use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use pacer_core::agenda::{AgendaPatch, Session};
use pacer_core::calendar::Event;
use pacer_core::conflict::{
    Adjustment, REBALANCE_MAX_CHARS, Resolution, classify, rebalance_instruction,
    rebalance_prompt, resolve,
};
use pacer_core::error::ApiError;

use crate::error::AppError;
use crate::llm::Generate;
use crate::routes::extract_user_id;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/calendar/conflict-check", post(conflict_check))
        .route("/v1/calendar/join", post(join_event))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheckRequest {
    /// Date of the event being considered
    pub date: NaiveDate,
}

/// Classifier verdict for one event date.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_session: Option<Session>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinEventRequest {
    pub event: Event,
    /// Strategy to apply if the event collides with a planned workout
    pub resolution: Resolution,
}

/// Outcome of a join. The join itself always succeeds; `resolutionApplied`
/// says what actually happened to the schedule.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinEventResponse {
    pub conflict: bool,
    /// "replace", "move", "rebalance", "add", or "none" when nothing changed
    pub resolution_applied: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Why the schedule is unchanged despite a conflict (e.g. move found no
    /// low-load day)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Agenda write version after the merge, when one happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda_version: Option<i64>,
}

/// Check whether an event date collides with a planned workout
///
/// A rest day or an empty day on that date is not a conflict.
#[utoipa::path(
    post,
    path = "/v1/calendar/conflict-check",
    request_body = ConflictCheckRequest,
    responses(
        (status = 200, description = "Classifier verdict", body = ConflictCheckResponse),
        (status = 404, description = "No agenda exists", body = ApiError)
    ),
    params(
        ("x-user-id" = uuid::Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "calendar"
)]
pub async fn conflict_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConflictCheckRequest>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;

    let stored = state
        .store()
        .load(user_id)
        .await?
        .ok_or(AppError::NotFound { resource: "agenda" })?;

    let verdict = classify(&stored.agenda, req.date);

    Ok(Json(match verdict {
        Some(conflict) => ConflictCheckResponse {
            has_conflict: true,
            week_number: Some(conflict.week_number),
            conflicting_session: Some(conflict.session),
        },
        None => ConflictCheckResponse {
            has_conflict: false,
            week_number: None,
            conflicting_session: None,
        },
    }))
}

/// Join a calendar event, reconciling it against the agenda
///
/// Classifies the event date first. On a conflict, applies the chosen
/// resolution and merges the adjusted week back into the agenda. A rebalance
/// asks the text-generation service for a reduced-intensity rewrite and falls
/// back deterministically when generation fails — the join still succeeds.
#[utoipa::path(
    post,
    path = "/v1/calendar/join",
    request_body = JoinEventRequest,
    responses(
        (status = 200, description = "Join outcome", body = JoinEventResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "No agenda exists", body = ApiError)
    ),
    params(
        ("x-user-id" = uuid::Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "calendar"
)]
pub async fn join_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<JoinEventRequest>,
) -> Result<Json<JoinEventResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;

    let stored = state
        .store()
        .load(user_id)
        .await?
        .ok_or(AppError::NotFound { resource: "agenda" })?;

    let Some(conflict) = classify(&stored.agenda, req.event.date) else {
        return Ok(Json(JoinEventResponse {
            conflict: false,
            resolution_applied: "none".to_string(),
            summary: None,
            reason: None,
            agenda_version: None,
        }));
    };

    // Generation happens up front so the resolver stays pure
    let rewritten = if req.resolution == Resolution::Rebalance {
        rebalance_text(
            &state.generator,
            &conflict.session.exercise_details,
            &req.event.title,
        )
        .await
    } else {
        None
    };

    let adjustment = resolve(
        &stored.agenda,
        req.event.date,
        &req.event.title,
        req.resolution,
        rewritten,
    );

    let response = match adjustment {
        Adjustment::Unchanged => JoinEventResponse {
            conflict: true,
            resolution_applied: "add".to_string(),
            summary: Some("Event and planned session both stand".to_string()),
            reason: None,
            agenda_version: None,
        },
        Adjustment::NoLowLoadDay { week_number } => JoinEventResponse {
            conflict: true,
            resolution_applied: "none".to_string(),
            summary: None,
            reason: Some(format!(
                "Week {week_number} has no low-load day to move the workout to; \
                 the schedule is unchanged"
            )),
            agenda_version: None,
        },
        Adjustment::Adjusted { patch, summary } => {
            let stored = state
                .store()
                .write(user_id, AgendaPatch::single_week(patch))
                .await?;
            JoinEventResponse {
                conflict: true,
                resolution_applied: resolution_label(req.resolution).to_string(),
                summary: Some(summary),
                reason: None,
                agenda_version: Some(stored.version),
            }
        }
    };

    Ok(Json(response))
}

fn resolution_label(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Replace => "replace",
        Resolution::Move => "move",
        Resolution::Rebalance => "rebalance",
        Resolution::Add => "add",
    }
}

/// Ask the generation service for a reduced-intensity rewrite.
///
/// Returns `None` on any failure, timeout, or unusable reply (empty, over the
/// length budget) — the caller then takes the deterministic fallback. The
/// failure is logged and never propagated.
async fn rebalance_text<G: Generate>(
    generator: &G,
    exercise_details: &str,
    event_title: &str,
) -> Option<String> {
    let result = generator
        .generate(
            &rebalance_instruction(),
            &rebalance_prompt(exercise_details, event_title),
        )
        .await;

    match result {
        Ok(text) => {
            let text = text.trim().to_string();
            if text.is_empty() || text.chars().count() > REBALANCE_MAX_CHARS {
                tracing::warn!(
                    len = text.chars().count(),
                    "rebalance reply unusable, using deterministic fallback"
                );
                None
            } else {
                Some(text)
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "rebalance generation failed, using deterministic fallback");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::llm::{Generate, GenerationError};

    use super::rebalance_text;

    struct Canned(Result<&'static str, ()>);

    impl Generate for Canned {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, GenerationError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(GenerationError::EmptyResponse),
            }
        }
    }

    #[tokio::test]
    async fn usable_reply_is_trimmed_and_kept() {
        let text = rebalance_text(&Canned(Ok("  Easy Jog 30min \n")), "Tempo Run", "Club 10k").await;
        assert_eq!(text.as_deref(), Some("Easy Jog 30min"));
    }

    #[tokio::test]
    async fn generation_failure_selects_the_fallback() {
        let text = rebalance_text(&Canned(Err(())), "Tempo Run", "Club 10k").await;
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn overlong_reply_selects_the_fallback() {
        let long = "Run easy and keep the effort conversational for the entire session today";
        assert!(long.chars().count() > 60);
        let text = rebalance_text(&Canned(Ok(long)), "Tempo Run", "Club 10k").await;
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn blank_reply_selects_the_fallback() {
        let text = rebalance_text(&Canned(Ok("   ")), "Tempo Run", "Club 10k").await;
        assert!(text.is_none());
    }
}
