use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{
    Notification, NotificationCategory, NotificationFilter, NotificationPreferences,
    NotificationPreferencesRepository, NotificationRepository, UpdateNotificationPreferences,
};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route(
            "/preferences",
            get(get_preferences).put(update_preferences),
        )
        .route("/:id/read", put(mark_read))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub unread_only: Option<bool>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub items: Vec<NotificationResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub is_read: bool,
    pub priority: String,
    pub category: String,
    pub scheduled_for: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        let data = n.data_json();
        Self {
            id: n.id,
            notification_type: n.notification_type,
            title: n.title,
            message: n.message,
            data,
            is_read: n.is_read,
            priority: n.priority,
            category: n.category,
            scheduled_for: n.scheduled_for,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// List visible notifications for the current user
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let category = match query.category.as_deref() {
        Some(raw) if !raw.is_empty() => Some(
            NotificationCategory::try_from(raw).map_err(AppError::BadRequest)?,
        ),
        _ => None,
    };
    let filter = NotificationFilter {
        unread_only: query.unread_only.unwrap_or(false),
        category,
    };
    let now = Utc::now().naive_utc();

    let (items, total) = tokio::try_join!(
        NotificationRepository::find_for_user(&state.db, &user.id, now, &filter, per_page, offset),
        NotificationRepository::count_for_user(&state.db, &user.id, now, &filter),
    )?;

    let total_pages = (total + per_page - 1) / per_page;

    Ok(Json(NotificationsListResponse {
        items: items.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
        total_pages,
    }))
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<CountResponse>> {
    let filter = NotificationFilter {
        unread_only: true,
        category: None,
    };
    let count =
        NotificationRepository::count_for_user(&state.db, &user.id, Utc::now().naive_utc(), &filter)
            .await?;
    Ok(Json(CountResponse { count }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = NotificationRepository::mark_read(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(i18n::t("not_found.notification")))?;
    Ok(Json(notification.into()))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<CountResponse>> {
    let updated = NotificationRepository::mark_all_read(&state.db, &user.id).await?;
    tracing::debug!("Marked {} notifications read for user {}", updated, user.id);
    Ok(Json(CountResponse {
        count: updated as i64,
    }))
}

async fn get_preferences(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<NotificationPreferences>> {
    let prefs = NotificationPreferencesRepository::get_or_create(&state.db, &user.id).await?;
    Ok(Json(prefs))
}

/// Quiet-hours bounds are strict `HH:MM`.
fn quiet_hour(raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(time) if raw.len() == 5 => Ok(time.format("%H:%M").to_string()),
        _ => Err(AppError::Validation(i18n::t("validation.quiet_hours"))),
    }
}

/// Reduce a language tag to a supported code (`"AM-et"` becomes `"am"`).
fn language_code(raw: &str) -> AppResult<String> {
    let code = i18n::normalize_language(raw.trim());
    if i18n::is_supported_language(&code) {
        Ok(code)
    } else {
        Err(AppError::Validation(i18n::t_with(
            "validation.language",
            &[("lang", raw)],
        )))
    }
}

async fn update_preferences(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(mut update): Json<UpdateNotificationPreferences>,
) -> AppResult<Json<NotificationPreferences>> {
    if let Some(start) = update.quiet_hours_start.as_deref() {
        update.quiet_hours_start = Some(quiet_hour(start)?);
    }
    if let Some(end) = update.quiet_hours_end.as_deref() {
        update.quiet_hours_end = Some(quiet_hour(end)?);
    }
    if let Some(lang) = update.language.as_deref() {
        update.language = Some(language_code(lang)?);
    }

    let prefs = NotificationPreferencesRepository::update(&state.db, &user.id, update).await?;
    tracing::info!("Updated notification preferences for user {}", user.id);
    Ok(Json(prefs))
}
