use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A community calendar event the user is joining. Owned by the calendar
/// service — the agenda engine only reads the date and descriptors it needs
/// for conflict classification, and never writes events back.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    /// Calendar date the event takes place on
    pub date: NaiveDate,
    /// Start time as displayed (e.g. "18:30")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Activity kind (e.g. "group run", "spin class")
    #[serde(rename = "type")]
    pub event_type: String,
    /// Advertised intensity (e.g. "easy", "hard")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
