use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::{CreateStudyReminder, StudyReminder, UpdateStudyReminder};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_reminder).post(create_reminder))
        .route("/:id", put(update_reminder).delete(delete_reminder))
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StudyReminderResponse {
    pub id: String,
    pub is_enabled: bool,
    pub reminder_time: String,
    pub days_of_week: Vec<String>,
    pub study_goal_minutes: i64,
    pub timezone: String,
    pub last_sent_at: Option<NaiveDateTime>,
    pub next_scheduled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<StudyReminder> for StudyReminderResponse {
    fn from(r: StudyReminder) -> Self {
        let days_of_week = serde_json::from_str(&r.days_of_week).unwrap_or_default();
        Self {
            id: r.id,
            is_enabled: r.is_enabled,
            reminder_time: r.reminder_time,
            days_of_week,
            study_goal_minutes: r.study_goal_minutes,
            timezone: r.timezone,
            last_sent_at: r.last_sent_at,
            next_scheduled_at: r.next_scheduled_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_reminder(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<StudyReminderResponse>> {
    let reminder = state.reminders.get_study_reminder(&user.id).await?;
    Ok(Json(reminder.into()))
}

async fn create_reminder(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateStudyReminder>,
) -> AppResult<(StatusCode, Json<StudyReminderResponse>)> {
    let reminder = state
        .reminders
        .create_study_reminder(&user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(reminder.into())))
}

async fn update_reminder(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateStudyReminder>,
) -> AppResult<Json<StudyReminderResponse>> {
    let reminder = state
        .reminders
        .update_study_reminder(&id, &user.id, request)
        .await?;
    Ok(Json(reminder.into()))
}

async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.reminders.delete_study_reminder(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
