use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use pacer_core::agenda::{Agenda, AgendaPatch, DEFAULT_TOTAL_WEEKS, Week};
use pacer_core::error::ApiError;

use crate::error::AppError;
use crate::routes::extract_user_id;
use crate::state::AppState;
use crate::store::StoredAgenda;

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/v1/agenda", post(create_agenda))
        .route("/v1/agenda", patch(update_agenda))
        .route("/v1/agenda", delete(reset_agenda))
}

pub fn read_router() -> Router<AppState> {
    Router::new().route("/v1/agenda", get(get_agenda))
}

/// Onboarding payload: profile fields plus the fully generated first week.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgendaRequest {
    pub goal: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub total_weeks: Option<u32>,
    #[serde(default)]
    pub training_frequency: Option<String>,
    #[serde(default)]
    pub injuries: Option<String>,
    #[serde(default)]
    pub work_type: Option<String>,
    #[serde(default)]
    pub user_data: Option<serde_json::Value>,
    pub first_week: Week,
}

/// A stored agenda with its row identity and write version.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgendaResponse {
    pub id: Uuid,
    pub version: i64,
    #[serde(flatten)]
    pub agenda: Agenda,
}

impl From<StoredAgenda> for AgendaResponse {
    fn from(stored: StoredAgenda) -> Self {
        Self {
            id: stored.id,
            version: stored.version,
            agenda: stored.agenda,
        }
    }
}

/// Both halves of the logical unit removed by a reset.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgendaDeletedResponse {
    pub deleted_agenda_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_chat_id: Option<Uuid>,
}

fn validate_create(req: &CreateAgendaRequest) -> Result<(), AppError> {
    if req.goal.trim().is_empty() {
        return Err(AppError::Validation {
            message: "goal must not be empty".to_string(),
            field: Some("goal".to_string()),
            received: Some(serde_json::Value::String(req.goal.clone())),
            docs_hint: Some("State the training goal, e.g. '5k under 25 minutes'".to_string()),
        });
    }

    if req.first_week.week_number != 1 {
        return Err(AppError::Validation {
            message: "firstWeek.weekNumber must be 1".to_string(),
            field: Some("firstWeek.weekNumber".to_string()),
            received: Some(serde_json::json!(req.first_week.week_number)),
            docs_hint: None,
        });
    }

    if req.first_week.sessions.is_empty() {
        return Err(AppError::Validation {
            message: "firstWeek.sessions must not be empty".to_string(),
            field: Some("firstWeek.sessions".to_string()),
            received: None,
            docs_hint: Some(
                "An agenda is created only after the first week is fully generated".to_string(),
            ),
        });
    }

    for (i, session) in req.first_week.sessions.iter().enumerate() {
        // Generated sessions always carry workout text; recovery days say
        // "Rest Day ...", so empty is a malformed generation, not a rest day.
        if session.exercise_details.trim().is_empty() {
            return Err(AppError::Validation {
                message: format!("firstWeek.sessions[{i}].exerciseDetails must not be empty"),
                field: Some(format!("firstWeek.sessions[{i}].exerciseDetails")),
                received: None,
                docs_hint: Some(
                    "Every generated session carries workout text, e.g. 'Tempo Run 60min' \
                     or 'Rest Day'"
                        .to_string(),
                ),
            });
        }
    }

    let mut dates: Vec<NaiveDate> = req.first_week.sessions.iter().map(|s| s.date).collect();
    dates.sort();
    if dates.windows(2).any(|w| w[0] == w[1]) {
        return Err(AppError::Validation {
            message: "firstWeek.sessions contains duplicate dates".to_string(),
            field: Some("firstWeek.sessions".to_string()),
            received: None,
            docs_hint: Some("Session dates must be unique within a week".to_string()),
        });
    }

    if let Some(total_weeks) = req.total_weeks {
        if total_weeks == 0 {
            return Err(AppError::Validation {
                message: "totalWeeks must be at least 1".to_string(),
                field: Some("totalWeeks".to_string()),
                received: Some(serde_json::json!(total_weeks)),
                docs_hint: None,
            });
        }
    }

    Ok(())
}

fn validate_patch(patch: &AgendaPatch) -> Result<(), AppError> {
    if patch.weeks.is_empty() && patch.current_week.is_none() {
        return Err(AppError::Validation {
            message: "patch must carry at least one week or a currentWeek update".to_string(),
            field: Some("weeks".to_string()),
            received: None,
            docs_hint: Some(
                "A check-in patch has one week with the updated sessions; a rollover \
                 patch has the new week plus currentWeek"
                    .to_string(),
            ),
        });
    }

    for (i, week) in patch.weeks.iter().enumerate() {
        if week.week_number == 0 {
            return Err(AppError::Validation {
                message: format!("weeks[{i}].weekNumber must be at least 1"),
                field: Some(format!("weeks[{i}].weekNumber")),
                received: Some(serde_json::json!(week.week_number)),
                docs_hint: None,
            });
        }
        if week.sessions.is_empty() && !week.replace_sessions {
            return Err(AppError::Validation {
                message: format!("weeks[{i}].sessions must not be empty"),
                field: Some(format!("weeks[{i}].sessions")),
                received: None,
                docs_hint: None,
            });
        }
        for (j, session) in week.sessions.iter().enumerate() {
            for (name, value) in [("rating", session.rating), ("energy", session.energy)] {
                if let Some(value) = value {
                    if !(1..=3).contains(&value) {
                        return Err(AppError::Validation {
                            message: format!(
                                "weeks[{i}].sessions[{j}].{name} must be between 1 and 3"
                            ),
                            field: Some(format!("weeks[{i}].sessions[{j}].{name}")),
                            received: Some(serde_json::json!(value)),
                            docs_hint: Some(
                                "Check-in scales run 1 (low) to 3 (high)".to_string(),
                            ),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

/// Create the agenda at onboarding completion
///
/// Accepts the fully generated first week plus profile fields. At most one
/// live agenda exists per user: a second create fails with already_exists and
/// leaves the stored agenda untouched.
#[utoipa::path(
    post,
    path = "/v1/agenda",
    request_body = CreateAgendaRequest,
    responses(
        (status = 201, description = "Agenda created", body = AgendaResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Agenda already exists", body = ApiError)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "agenda"
)]
pub async fn create_agenda(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAgendaRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = extract_user_id(&headers)?;
    validate_create(&req)?;

    let mut first_week = req.first_week;
    first_week.sessions.sort_by_key(|s| s.date);

    let agenda = Agenda {
        goal: req.goal,
        start_date: req.start_date,
        current_week: 1,
        total_weeks: req.total_weeks.unwrap_or(DEFAULT_TOTAL_WEEKS),
        training_frequency: req.training_frequency,
        injuries: req.injuries,
        work_type: req.work_type,
        user_data: req.user_data.unwrap_or(serde_json::Value::Null),
        weeks: vec![first_week],
    };

    let stored = state.store().create(user_id, agenda).await?;

    Ok((StatusCode::CREATED, Json(AgendaResponse::from(stored))))
}

/// Fetch the user's agenda
#[utoipa::path(
    get,
    path = "/v1/agenda",
    responses(
        (status = 200, description = "The user's agenda", body = AgendaResponse),
        (status = 404, description = "No agenda exists", body = ApiError)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "agenda"
)]
pub async fn get_agenda(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AgendaResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;

    let stored = state
        .store()
        .load(user_id)
        .await?
        .ok_or(AppError::NotFound { resource: "agenda" })?;

    Ok(Json(AgendaResponse::from(stored)))
}

/// Merge a partial update into the agenda
///
/// The entry point for daily check-ins and weekly rollovers. Weeks match by
/// weekNumber, sessions match by date, and only the fields present in the
/// patch overwrite stored values. Fails with not_found when no agenda exists —
/// it never silently no-ops.
#[utoipa::path(
    patch,
    path = "/v1/agenda",
    request_body = AgendaPatch,
    responses(
        (status = 200, description = "Merged agenda", body = AgendaResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "No agenda exists", body = ApiError)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "agenda"
)]
pub async fn update_agenda(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<AgendaPatch>,
) -> Result<Json<AgendaResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;
    validate_patch(&patch)?;

    let stored = state.store().write(user_id, patch).await?;

    Ok(Json(AgendaResponse::from(stored)))
}

/// Reset: delete the agenda and its conversation as one unit
#[utoipa::path(
    delete,
    path = "/v1/agenda",
    responses(
        (status = 200, description = "Agenda and conversation deleted", body = AgendaDeletedResponse),
        (status = 404, description = "No agenda exists", body = ApiError)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "User ID (temporary, replaced by auth)")
    ),
    tag = "agenda"
)]
pub async fn reset_agenda(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AgendaDeletedResponse>, AppError> {
    let user_id = extract_user_id(&headers)?;

    let deleted = state.store().delete(user_id).await?;

    Ok(Json(AgendaDeletedResponse {
        deleted_agenda_id: deleted.agenda_id,
        deleted_chat_id: deleted.chat_id,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pacer_core::agenda::{AgendaPatch, Session, SessionPatch, Week, WeekPatch, Weekday};

    use super::{CreateAgendaRequest, validate_create, validate_patch};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn session(d: &str) -> Session {
        let date = date(d);
        Session {
            day: Weekday::from_date(date),
            date,
            completed: false,
            exercise_details: "Run".to_string(),
            meal_details: String::new(),
            sleep_details: String::new(),
            current_day_number: 1,
            total_training_days: 3,
            rating: None,
            meals: None,
            sleep: None,
            energy: None,
            notes: None,
        }
    }

    fn create_request(sessions: Vec<Session>) -> CreateAgendaRequest {
        CreateAgendaRequest {
            goal: "5k under 25min".to_string(),
            start_date: date("2025-12-01"),
            total_weeks: None,
            training_frequency: None,
            injuries: None,
            work_type: None,
            user_data: None,
            first_week: Week {
                week_number: 1,
                sessions,
            },
        }
    }

    #[test]
    fn create_requires_a_nonempty_first_week() {
        let err = validate_create(&create_request(vec![])).unwrap_err();
        let msg = format!("{err:?}");
        assert!(msg.contains("firstWeek.sessions"));
    }

    #[test]
    fn create_rejects_sessions_without_exercise_details() {
        let mut blank = session("2025-12-01");
        blank.exercise_details = String::new();
        let err = validate_create(&create_request(vec![blank])).unwrap_err();
        let msg = format!("{err:?}");
        assert!(msg.contains("exerciseDetails"));
    }

    #[test]
    fn create_rejects_duplicate_session_dates() {
        let req = create_request(vec![session("2025-12-01"), session("2025-12-01")]);
        assert!(validate_create(&req).is_err());
    }

    #[test]
    fn create_accepts_a_well_formed_first_week() {
        let req = create_request(vec![session("2025-12-01"), session("2025-12-03")]);
        assert!(validate_create(&req).is_ok());
    }

    #[test]
    fn patch_must_carry_weeks_or_a_rollover() {
        let empty = AgendaPatch {
            current_week: None,
            weeks: vec![],
        };
        assert!(validate_patch(&empty).is_err());

        let rollover_only = AgendaPatch {
            current_week: Some(2),
            weeks: vec![],
        };
        assert!(validate_patch(&rollover_only).is_ok());
    }

    #[test]
    fn patch_rejects_week_number_zero() {
        let patch = AgendaPatch::single_week(WeekPatch {
            week_number: 0,
            replace_sessions: false,
            sessions: vec![SessionPatch {
                date: date("2025-12-01"),
                ..Default::default()
            }],
        });
        assert!(validate_patch(&patch).is_err());
    }

    #[test]
    fn patch_rejects_out_of_range_feedback_scales() {
        let patch_with = |rating: Option<u8>, energy: Option<u8>| {
            AgendaPatch::single_week(WeekPatch {
                week_number: 1,
                replace_sessions: false,
                sessions: vec![SessionPatch {
                    date: date("2025-12-01"),
                    rating,
                    energy,
                    ..Default::default()
                }],
            })
        };

        assert!(validate_patch(&patch_with(Some(0), None)).is_err());
        assert!(validate_patch(&patch_with(Some(4), None)).is_err());
        assert!(validate_patch(&patch_with(None, Some(0))).is_err());
        assert!(validate_patch(&patch_with(None, Some(5))).is_err());
        for value in 1..=3 {
            assert!(validate_patch(&patch_with(Some(value), Some(value))).is_ok());
        }
    }

    #[test]
    fn patch_allows_an_empty_list_only_when_replacing() {
        let replacing = AgendaPatch::single_week(WeekPatch {
            week_number: 1,
            replace_sessions: true,
            sessions: vec![],
        });
        assert!(validate_patch(&replacing).is_ok());

        let upserting = AgendaPatch::single_week(WeekPatch {
            week_number: 1,
            replace_sessions: false,
            sessions: vec![],
        });
        assert!(validate_patch(&upserting).is_err());
    }
}
