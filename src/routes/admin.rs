use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppResult;
use crate::routes::auth::AdminUser;
use crate::services::notifications::CreateAnnouncement;
use crate::services::reminders::ReminderSweep;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reminders/check", post(check_reminders))
        .route("/announcements", post(create_announcement))
}

#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub created: usize,
}

/// Run the reminder matcher for the current minute, outside the scheduler.
async fn check_reminders(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<ReminderSweep>> {
    tracing::info!("Manual reminder check requested by {}", admin.id);
    let sweep = state.reminders.check_study_reminders(Utc::now()).await?;
    Ok(Json(sweep))
}

async fn create_announcement(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateAnnouncement>,
) -> AppResult<(StatusCode, Json<AnnouncementResponse>)> {
    tracing::info!("Announcement {:?} requested by {}", request.title, admin.id);
    let created = state.notifications.announce(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(AnnouncementResponse { created })))
}
