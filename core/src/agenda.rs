use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Display label for a session's day of week. Stored redundantly alongside
/// `date` for rendering; `date` is the canonical identity of a session.
/// The generator keeps the two consistent — the merge layer never re-derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Derive the display label from a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled day of the plan: training, nutrition, and sleep guidance set
/// at generation time, plus feedback fields filled in by daily check-ins.
///
/// Wire field names are fixed — stored agendas and the generation prompt
/// contract both depend on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Display label, derived from `date`
    pub day: Weekday,
    /// Calendar date — the canonical merge key, unique within a week
    pub date: NaiveDate,
    /// Whether the user checked this day off
    #[serde(default)]
    pub completed: bool,
    /// Planned workout (empty or "Rest Day ..." for recovery days)
    #[serde(default)]
    pub exercise_details: String,
    /// Nutrition guidance for the day
    #[serde(default)]
    pub meal_details: String,
    /// Sleep guidance for the day
    #[serde(default)]
    pub sleep_details: String,
    /// 1-based position among training days, set at generation time
    #[serde(default)]
    pub current_day_number: u32,
    /// Total training days in the plan, set at generation time
    #[serde(default)]
    pub total_training_days: u32,
    /// Check-in: session rating 1–3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Check-in: followed the meal guidance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meals: Option<bool>,
    /// Check-in: followed the sleep guidance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<bool>,
    /// Check-in: energy level 1–3
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<u8>,
    /// Free-form check-in notes; also written by conflict resolution to record
    /// an automated adjustment reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial update for one session. `date` is the key and always present;
/// every other field overwrites the stored session only when present.
/// Absent fields are preserved — a check-in carrying only feedback never
/// clobbers the generated `exerciseDetails`/`mealDetails`/`sleepDetails`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<Weekday>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_day_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_training_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meals: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SessionPatch {
    /// Field-level upsert: every present field overwrites, every absent field
    /// is preserved from the existing session.
    pub fn apply_to(self, session: &mut Session) {
        if let Some(day) = self.day {
            session.day = day;
        }
        if let Some(completed) = self.completed {
            session.completed = completed;
        }
        if let Some(exercise_details) = self.exercise_details {
            session.exercise_details = exercise_details;
        }
        if let Some(meal_details) = self.meal_details {
            session.meal_details = meal_details;
        }
        if let Some(sleep_details) = self.sleep_details {
            session.sleep_details = sleep_details;
        }
        if let Some(current_day_number) = self.current_day_number {
            session.current_day_number = current_day_number;
        }
        if let Some(total_training_days) = self.total_training_days {
            session.total_training_days = total_training_days;
        }
        if let Some(rating) = self.rating {
            session.rating = Some(rating);
        }
        if let Some(meals) = self.meals {
            session.meals = Some(meals);
        }
        if let Some(sleep) = self.sleep {
            session.sleep = Some(sleep);
        }
        if let Some(energy) = self.energy {
            session.energy = Some(energy);
        }
        if let Some(notes) = self.notes {
            session.notes = Some(notes);
        }
    }

    /// Materialize a full session from a patch that matched nothing.
    /// The day label falls back to being derived from the date.
    pub fn into_session(self) -> Session {
        let mut session = Session {
            day: self.day.unwrap_or_else(|| Weekday::from_date(self.date)),
            date: self.date,
            completed: false,
            exercise_details: String::new(),
            meal_details: String::new(),
            sleep_details: String::new(),
            current_day_number: 0,
            total_training_days: 0,
            rating: None,
            meals: None,
            sleep: None,
            energy: None,
            notes: None,
        };
        self.apply_to(&mut session);
        session
    }

    /// Patch carrying every field of an existing session. Used by the conflict
    /// resolver, whose output is a week's full adjusted session list.
    pub fn from_session(session: &Session) -> Self {
        Self {
            date: session.date,
            day: Some(session.day),
            completed: Some(session.completed),
            exercise_details: Some(session.exercise_details.clone()),
            meal_details: Some(session.meal_details.clone()),
            sleep_details: Some(session.sleep_details.clone()),
            current_day_number: Some(session.current_day_number),
            total_training_days: Some(session.total_training_days),
            rating: session.rating,
            meals: session.meals,
            sleep: session.sleep,
            energy: session.energy,
            notes: session.notes.clone(),
        }
    }
}

/// A numbered group of sessions within an agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    /// 1-based, unique within an agenda
    pub week_number: u32,
    /// Kept sorted ascending by date after every merge
    pub sessions: Vec<Session>,
}

/// Partial update for one week.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeekPatch {
    pub week_number: u32,
    /// When true, the patched session list replaces the week's sessions
    /// wholesale instead of upserting. Only the conflict resolver sets this —
    /// removing a session is not expressible as an upsert.
    #[serde(default)]
    pub replace_sessions: bool,
    pub sessions: Vec<SessionPatch>,
}

/// A partial agenda update: one or more weeks with only the changed fields
/// populated. Produced by check-ins, weekly rollovers, and conflict resolution;
/// consumed by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgendaPatch {
    /// Advance the current-week pointer (weekly rollover)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_week: Option<u32>,
    pub weeks: Vec<WeekPatch>,
}

impl AgendaPatch {
    pub fn single_week(week: WeekPatch) -> Self {
        Self {
            current_week: None,
            weeks: vec![week],
        }
    }
}

pub const DEFAULT_TOTAL_WEEKS: u32 = 12;

fn default_total_weeks() -> u32 {
    DEFAULT_TOTAL_WEEKS
}

fn default_current_week() -> u32 {
    1
}

/// The per-user aggregate root: the whole multi-week plan plus its progress
/// state. At most one live agenda exists per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Agenda {
    /// The user's stated training goal
    pub goal: String,
    /// First day of week 1
    pub start_date: NaiveDate,
    /// Which week the user is currently in
    #[serde(default = "default_current_week")]
    pub current_week: u32,
    /// Planned length of the program
    #[serde(default = "default_total_weeks")]
    pub total_weeks: u32,
    /// Sessions per week the user asked for (e.g. "3-4")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_frequency: Option<String>,
    /// Injuries or limitations to plan around
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injuries: Option<String>,
    /// Sedentary / active occupation, feeds plan generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    /// Profile snapshot used for plan generation — opaque to the engine
    #[serde(default)]
    pub user_data: serde_json::Value,
    /// Kept sorted ascending by week number after every merge
    pub weeks: Vec<Week>,
}

impl Agenda {
    /// Look up a week by number.
    pub fn week(&self, week_number: u32) -> Option<&Week> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Session, SessionPatch, Weekday};

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

    #[test]
    fn weekday_derives_from_date() {
        assert_eq!(Weekday::from_date(date("2025-12-01")), Weekday::Monday);
        assert_eq!(Weekday::from_date(date("2025-12-07")), Weekday::Sunday);
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let mut existing = session("2025-12-05", "Run");
        existing.meal_details = "Carbs".to_string();

        let patch = SessionPatch {
            date: date("2025-12-05"),
            completed: Some(true),
            rating: Some(2),
            ..Default::default()
        };
        patch.apply_to(&mut existing);

        assert_eq!(existing.exercise_details, "Run");
        assert_eq!(existing.meal_details, "Carbs");
        assert!(existing.completed);
        assert_eq!(existing.rating, Some(2));
    }

    #[test]
    fn into_session_derives_day_when_absent() {
        let patch = SessionPatch {
            date: date("2025-12-06"),
            exercise_details: Some("Tempo Run".to_string()),
            ..Default::default()
        };
        let session = patch.into_session();
        assert_eq!(session.day, Weekday::Saturday);
        assert_eq!(session.exercise_details, "Tempo Run");
        assert!(!session.completed);
    }

    #[test]
    fn from_session_round_trips_every_field() {
        let mut original = session("2025-12-05", "Intervals");
        original.completed = true;
        original.notes = Some("felt strong".to_string());

        let rebuilt = SessionPatch::from_session(&original).into_session();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn session_wire_names_are_stable() {
        let s = session("2025-12-05", "Run");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["day"], "Friday");
        assert_eq!(json["date"], "2025-12-05");
        assert_eq!(json["exerciseDetails"], "Run");
        assert!(json.get("currentDayNumber").is_some());
        // absent feedback fields stay off the wire
        assert!(json.get("rating").is_none());
    }
}
