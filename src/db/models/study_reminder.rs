use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A per-user study schedule: a time of day plus the weekdays it fires on.
///
/// `reminder_time` is stored as `HH:MM` in the reminder's own `timezone`.
/// `days_of_week` is a JSON array of weekday names (e.g. `["Monday","Friday"]`).
/// `is_enabled` is the user's on/off toggle; `is_active = false` marks a
/// soft-deleted reminder which the scheduler must never select again.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudyReminder {
    pub id: String,
    pub user_id: String,
    pub is_enabled: bool,
    pub reminder_time: String,
    pub days_of_week: String,
    pub study_goal_minutes: i64,
    pub timezone: String,
    pub last_sent_at: Option<NaiveDateTime>,
    pub next_scheduled_at: Option<NaiveDateTime>,
    pub is_active: bool,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Request payload for creating a reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudyReminder {
    #[serde(alias = "reminderTime")]
    pub reminder_time: String,
    #[serde(alias = "daysOfWeek")]
    pub days_of_week: Vec<String>,
    #[serde(default, alias = "studyGoalMinutes")]
    pub study_goal_minutes: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateStudyReminder {
    #[serde(default, alias = "reminderTime")]
    pub reminder_time: Option<String>,
    #[serde(default, alias = "daysOfWeek")]
    pub days_of_week: Option<Vec<String>>,
    #[serde(default, alias = "studyGoalMinutes")]
    pub study_goal_minutes: Option<i64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, alias = "isEnabled")]
    pub is_enabled: Option<bool>,
}

/// Validated row data handed to the repository on insert.
#[derive(Debug, Clone)]
pub struct NewStudyReminder {
    pub user_id: String,
    pub reminder_time: String,
    pub days_of_week: String,
    pub study_goal_minutes: i64,
    pub timezone: String,
    pub next_scheduled_at: NaiveDateTime,
}
