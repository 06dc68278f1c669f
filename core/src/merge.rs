//! The merge engine: reconciles a partial agenda update into an existing
//! agenda at (week, session) granularity.
//!
//! Weeks match by `weekNumber`, sessions match by `date` — the sole canonical
//! key. Matched sessions get a field-level upsert ([`SessionPatch::apply_to`]);
//! unmatched sessions and weeks are appended. Both sort invariants (sessions
//! by date, weeks by number) are restored before the result is handed back
//! for persistence as one atomic write.

use crate::agenda::{Agenda, AgendaPatch, SessionPatch, Week, WeekPatch};

/// Merge a partial update into an existing agenda, in place.
///
/// Idempotent per session-date: applying the same patch twice yields the same
/// agenda as applying it once.
pub fn merge_patch(agenda: &mut Agenda, patch: AgendaPatch) {
    if let Some(current_week) = patch.current_week {
        agenda.current_week = current_week;
    }

    for week_patch in patch.weeks {
        match agenda
            .weeks
            .iter_mut()
            .find(|w| w.week_number == week_patch.week_number)
        {
            Some(week) => merge_week(week, week_patch),
            None => agenda.weeks.push(new_week(week_patch)),
        }
    }

    agenda.weeks.sort_by_key(|w| w.week_number);
}

fn merge_week(week: &mut Week, patch: WeekPatch) {
    if patch.replace_sessions {
        week.sessions = patch
            .sessions
            .into_iter()
            .map(SessionPatch::into_session)
            .collect();
    } else {
        for session_patch in patch.sessions {
            match week
                .sessions
                .iter_mut()
                .find(|s| s.date == session_patch.date)
            {
                Some(session) => session_patch.apply_to(session),
                None => week.sessions.push(session_patch.into_session()),
            }
        }
    }
    week.sessions.sort_by_key(|s| s.date);
}

fn new_week(patch: WeekPatch) -> Week {
    let mut week = Week {
        week_number: patch.week_number,
        sessions: patch
            .sessions
            .into_iter()
            .map(SessionPatch::into_session)
            .collect(),
    };
    week.sessions.sort_by_key(|s| s.date);
    week
}
