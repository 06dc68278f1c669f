//! Conflict classification and resolution for joined calendar events.
//!
//! A joined event conflicts with the agenda when its date lands on a session
//! that represents an actual workout. Resolution produces a [`WeekPatch`]
//! carrying the affected week's full adjusted session list, which the caller
//! feeds back through the merge engine to persist.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::agenda::{Agenda, Session, SessionPatch, Week, WeekPatch};

/// Exact fallback prefix when rebalance text generation fails.
pub const REDUCED_LOAD_PREFIX: &str = "[Reduced Load] ";

/// Upper bound on a generated rebalance description.
pub const REBALANCE_MAX_CHARS: usize = 60;

const REST_MARKERS: &[&str] = &["rest", "no workout"];

/// A session counts as low-load when it has no workout planned or is marked
/// as a rest day. Low-load days never conflict and are valid move targets.
pub fn is_low_load(exercise_details: &str) -> bool {
    let details = exercise_details.trim();
    if details.is_empty() {
        return true;
    }
    let lower = details.to_lowercase();
    REST_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// A calendar event colliding with a planned workout.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Week owning the colliding session
    pub week_number: u32,
    /// The colliding session as currently scheduled
    pub session: Session,
}

/// Scan the agenda for a workout scheduled on `event_date`.
///
/// Scan order is week order, then session order; the first match wins.
/// A session on that date that is a rest day is not a conflict.
pub fn classify(agenda: &Agenda, event_date: NaiveDate) -> Option<Conflict> {
    for week in &agenda.weeks {
        for session in &week.sessions {
            if session.date == event_date && !is_low_load(&session.exercise_details) {
                return Some(Conflict {
                    week_number: week.week_number,
                    session: session.clone(),
                });
            }
        }
    }
    None
}

/// User-chosen strategy for a classified conflict. A wire value outside this
/// set is rejected at deserialization time rather than silently treated as
/// `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Drop the planned session; the event takes its place
    Replace,
    /// Swap the workout onto the week's first low-load day
    Move,
    /// Reduce the workout's intensity via generated text
    Rebalance,
    /// Keep both the event and the planned session
    Add,
}

/// Outcome of resolving a conflict.
#[derive(Debug, Clone)]
pub enum Adjustment {
    /// Nothing to merge: no conflict on that date, or the user chose `add`
    Unchanged,
    /// The affected week, fully adjusted, ready for the merge engine
    Adjusted { patch: WeekPatch, summary: String },
    /// `move` found no low-load day in the week; the schedule is untouched
    /// and the caller reports a partial resolution
    NoLowLoadDay { week_number: u32 },
}

/// Apply a resolution strategy to the conflict on `event_date`, if any.
///
/// `rewritten` carries the generated rebalance description when the caller
/// obtained one; `None` selects the deterministic reduced-load fallback.
/// Generation is the caller's concern — this function never does I/O.
pub fn resolve(
    agenda: &Agenda,
    event_date: NaiveDate,
    event_title: &str,
    resolution: Resolution,
    rewritten: Option<String>,
) -> Adjustment {
    let Some(conflict) = classify(agenda, event_date) else {
        return Adjustment::Unchanged;
    };
    // classify only returns weeks that exist
    let Some(week) = agenda.week(conflict.week_number) else {
        return Adjustment::Unchanged;
    };

    match resolution {
        Resolution::Add => Adjustment::Unchanged,
        Resolution::Replace => replace(week, event_date, event_title),
        Resolution::Move => move_workout(week, &conflict.session, event_title),
        Resolution::Rebalance => rebalance(week, &conflict.session, event_title, rewritten),
    }
}

/// Remove the conflicting session from its week entirely.
fn replace(week: &Week, event_date: NaiveDate, event_title: &str) -> Adjustment {
    let sessions: Vec<SessionPatch> = week
        .sessions
        .iter()
        .filter(|s| s.date != event_date)
        .map(SessionPatch::from_session)
        .collect();

    Adjustment::Adjusted {
        patch: WeekPatch {
            week_number: week.week_number,
            replace_sessions: true,
            sessions,
        },
        summary: format!("Planned session on {event_date} replaced by \"{event_title}\""),
    }
}

/// Swap the workout onto the first low-load day of the same week.
fn move_workout(week: &Week, conflicting: &Session, event_title: &str) -> Adjustment {
    let target = week
        .sessions
        .iter()
        .find(|s| s.date != conflicting.date && is_low_load(&s.exercise_details));
    let Some(target) = target else {
        return Adjustment::NoLowLoadDay {
            week_number: week.week_number,
        };
    };

    let moved_details = conflicting.exercise_details.clone();
    let mut sessions: Vec<Session> = week.sessions.clone();
    for session in &mut sessions {
        if session.date == conflicting.date {
            session.exercise_details = format!("Rest Day (workout moved to {})", target.day);
            session.notes = Some(format!("Cleared for event: {event_title}"));
        } else if session.date == target.date {
            session.exercise_details = moved_details.clone();
            session.notes = Some(format!(
                "Workout moved from {} to make room for \"{event_title}\"",
                conflicting.day
            ));
        }
    }

    Adjustment::Adjusted {
        patch: WeekPatch {
            week_number: week.week_number,
            replace_sessions: false,
            sessions: sessions.iter().map(SessionPatch::from_session).collect(),
        },
        summary: format!("Workout moved from {} to {}", conflicting.day, target.day),
    }
}

/// Rewrite the conflicting session to a lower load, keeping it on its date.
fn rebalance(
    week: &Week,
    conflicting: &Session,
    event_title: &str,
    rewritten: Option<String>,
) -> Adjustment {
    let new_details = rewritten
        .unwrap_or_else(|| format!("{REDUCED_LOAD_PREFIX}{}", conflicting.exercise_details));

    let mut sessions: Vec<Session> = week.sessions.clone();
    for session in &mut sessions {
        if session.date == conflicting.date {
            session.exercise_details = new_details.clone();
            session.notes = Some(format!(
                "Load reduced because of joined event: {event_title}"
            ));
        }
    }

    Adjustment::Adjusted {
        patch: WeekPatch {
            week_number: week.week_number,
            replace_sessions: false,
            sessions: sessions.iter().map(SessionPatch::from_session).collect(),
        },
        summary: format!("Session on {} rebalanced to: {new_details}", conflicting.date),
    }
}

/// System instruction for the rebalance rewrite.
pub fn rebalance_instruction() -> String {
    format!(
        "You adjust training plans. Rewrite the given workout at a reduced \
         intensity so the athlete can also attend the named event that day. \
         Reply with only the new workout description, at most \
         {REBALANCE_MAX_CHARS} characters."
    )
}

/// User prompt for the rebalance rewrite.
pub fn rebalance_prompt(exercise_details: &str, event_title: &str) -> String {
    format!("Workout: {exercise_details}\nEvent the same day: {event_title}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        Adjustment, REDUCED_LOAD_PREFIX, Resolution, classify, is_low_load, resolve,
    };
    use crate::agenda::{Agenda, Session, Week, Weekday};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn session(d: &str, exercise: &str) -> Session {
        let date = date(d);
        Session {
            day: Weekday::from_date(date),
            date,
            completed: false,
            exercise_details: exercise.to_string(),
            meal_details: String::new(),
            sleep_details: String::new(),
            current_day_number: 0,
            total_training_days: 0,
            rating: None,
            meals: None,
            sleep: None,
            energy: None,
            notes: None,
        }
    }

    fn agenda(weeks: Vec<Week>) -> Agenda {
        Agenda {
            goal: "base fitness".to_string(),
            start_date: date("2025-12-01"),
            current_week: 1,
            total_weeks: 12,
            training_frequency: None,
            injuries: None,
            work_type: None,
            user_data: serde_json::Value::Null,
            weeks,
        }
    }

    fn week3() -> Agenda {
        agenda(vec![Week {
            week_number: 3,
            sessions: vec![
                session("2025-12-04", "Rest Day"),
                session("2025-12-05", "Tempo Run 60min"),
                session("2025-12-06", "Long Run 90min"),
            ],
        }])
    }

    #[test]
    fn low_load_matches_rest_markers_case_insensitively() {
        assert!(is_low_load(""));
        assert!(is_low_load("  "));
        assert!(is_low_load("REST DAY"));
        assert!(is_low_load("Active recovery - no workout"));
        assert!(!is_low_load("Tempo Run 60min"));
    }

    #[test]
    fn rest_day_on_event_date_is_not_a_conflict() {
        let verdict = classify(&week3(), date("2025-12-04"));
        assert!(verdict.is_none());
    }

    #[test]
    fn workout_on_event_date_conflicts_with_owning_week() {
        let verdict = classify(&week3(), date("2025-12-05")).unwrap();
        assert_eq!(verdict.week_number, 3);
        assert_eq!(verdict.session.exercise_details, "Tempo Run 60min");
    }

    #[test]
    fn date_without_any_session_is_clean() {
        assert!(classify(&week3(), date("2025-12-25")).is_none());
    }

    #[test]
    fn replace_filters_the_conflicting_date_out() {
        let adjustment = resolve(
            &week3(),
            date("2025-12-05"),
            "Club 10k",
            Resolution::Replace,
            None,
        );
        let Adjustment::Adjusted { patch, .. } = adjustment else {
            panic!("expected an adjusted week");
        };
        assert_eq!(patch.week_number, 3);
        assert!(patch.replace_sessions);
        assert!(patch.sessions.iter().all(|s| s.date != date("2025-12-05")));
        assert_eq!(patch.sessions.len(), 2);
    }

    #[test]
    fn move_swaps_onto_the_first_low_load_day() {
        let adjustment = resolve(
            &week3(),
            date("2025-12-05"),
            "Club 10k",
            Resolution::Move,
            None,
        );
        let Adjustment::Adjusted { patch, .. } = adjustment else {
            panic!("expected an adjusted week");
        };

        let target = patch
            .sessions
            .iter()
            .find(|s| s.date == date("2025-12-04"))
            .unwrap();
        assert_eq!(target.exercise_details.as_deref(), Some("Tempo Run 60min"));
        assert!(target.notes.as_deref().unwrap().contains("Club 10k"));

        let cleared = patch
            .sessions
            .iter()
            .find(|s| s.date == date("2025-12-05"))
            .unwrap();
        let details = cleared.exercise_details.as_deref().unwrap();
        assert!(details.contains("Rest Day"));
        assert!(details.contains("Thursday"));
    }

    #[test]
    fn move_without_a_low_load_day_reports_no_slot() {
        let a = agenda(vec![Week {
            week_number: 1,
            sessions: vec![
                session("2025-12-01", "Intervals"),
                session("2025-12-02", "Long Run"),
            ],
        }]);
        let adjustment = resolve(&a, date("2025-12-01"), "Club 10k", Resolution::Move, None);
        assert!(matches!(
            adjustment,
            Adjustment::NoLowLoadDay { week_number: 1 }
        ));
    }

    #[test]
    fn rebalance_uses_the_generated_text_when_present() {
        let adjustment = resolve(
            &week3(),
            date("2025-12-05"),
            "Club 10k",
            Resolution::Rebalance,
            Some("Easy Jog 30min".to_string()),
        );
        let Adjustment::Adjusted { patch, .. } = adjustment else {
            panic!("expected an adjusted week");
        };
        let rewritten = patch
            .sessions
            .iter()
            .find(|s| s.date == date("2025-12-05"))
            .unwrap();
        assert_eq!(rewritten.exercise_details.as_deref(), Some("Easy Jog 30min"));
        assert!(rewritten.notes.as_deref().unwrap().contains("Club 10k"));
    }

    #[test]
    fn rebalance_fallback_prefixes_the_original_details() {
        let adjustment = resolve(
            &week3(),
            date("2025-12-05"),
            "Club 10k",
            Resolution::Rebalance,
            None,
        );
        let Adjustment::Adjusted { patch, .. } = adjustment else {
            panic!("expected an adjusted week");
        };
        let rewritten = patch
            .sessions
            .iter()
            .find(|s| s.date == date("2025-12-05"))
            .unwrap();
        assert_eq!(
            rewritten.exercise_details.as_deref(),
            Some(&*format!("{REDUCED_LOAD_PREFIX}Tempo Run 60min"))
        );
    }

    #[test]
    fn add_leaves_the_agenda_untouched() {
        let adjustment = resolve(
            &week3(),
            date("2025-12-05"),
            "Club 10k",
            Resolution::Add,
            None,
        );
        assert!(matches!(adjustment, Adjustment::Unchanged));
    }

    #[test]
    fn event_on_a_clean_date_resolves_to_unchanged() {
        let adjustment = resolve(
            &week3(),
            date("2025-12-25"),
            "Club 10k",
            Resolution::Replace,
            None,
        );
        assert!(matches!(adjustment, Adjustment::Unchanged));
    }

    #[test]
    fn unknown_resolution_values_are_rejected_at_the_wire() {
        assert!(serde_json::from_str::<Resolution>("\"delete\"").is_err());
        assert_eq!(
            serde_json::from_str::<Resolution>("\"rebalance\"").unwrap(),
            Resolution::Rebalance
        );
    }
}
