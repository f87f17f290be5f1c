use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Notification Repository
// ============================================================================

/// Listing filters for a user's notification feed.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub category: Option<NotificationCategory>,
}

pub struct NotificationRepository;

impl NotificationRepository {
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        // Never schedule into the past
        let scheduled_for = notification
            .scheduled_for
            .filter(|at| *at > now)
            .unwrap_or(now);
        let data = notification.data.map(|d| d.to_string());

        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                id, user_id, notification_type, title, message, data,
                is_read, is_push_sent, scheduled_for, priority, category,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?)
            RETURNING
                id, user_id, notification_type, title, message, data,
                is_read, is_push_sent, scheduled_for, priority, category,
                created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(notification.user_id)
        .bind(notification.notification_type.as_str())
        .bind(notification.title)
        .bind(notification.message)
        .bind(data)
        .bind(scheduled_for)
        .bind(notification.priority.as_str())
        .bind(notification.category.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Visible notifications (scheduled_for <= now) for a user, newest first.
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
        now: NaiveDateTime,
        filter: &NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        let category = filter.category.map(|c| c.as_str());

        sqlx::query_as::<_, Notification>(
            r#"
            SELECT
                id, user_id, notification_type, title, message, data,
                is_read, is_push_sent, scheduled_for, priority, category,
                created_at, updated_at
            FROM notifications
            WHERE user_id = ?
              AND scheduled_for <= ?
              AND (? = 0 OR is_read = 0)
              AND (? IS NULL OR category = ?)
            ORDER BY scheduled_for DESC, created_at DESC
            LIMIT ?
            OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(filter.unread_only)
        .bind(category)
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_for_user(
        pool: &SqlitePool,
        user_id: &str,
        now: NaiveDateTime,
        filter: &NotificationFilter,
    ) -> AppResult<i64> {
        let category = filter.category.map(|c| c.as_str());

        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE user_id = ?
              AND scheduled_for <= ?
              AND (? = 0 OR is_read = 0)
              AND (? IS NULL OR category = ?)
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(filter.unread_only)
        .bind(category)
        .bind(category)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Mark one notification read. Returns `None` if it does not belong to the user.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> AppResult<Option<Notification>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = 1, updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING
                id, user_id, notification_type, title, message, data,
                is_read, is_push_sent, scheduled_for, priority, category,
                created_at, updated_at
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> AppResult<u64> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = 1, updated_at = ?
            WHERE user_id = ? AND is_read = 0 AND scheduled_for <= ?
            "#,
        )
        .bind(now)
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn mark_push_sent(pool: &SqlitePool, id: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE notifications
            SET is_push_sent = 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn defer_push(pool: &SqlitePool, id: &str, until: NaiveDateTime) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE notifications
            SET push_deferred_until = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(until)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Due notifications that have not been pushed yet, oldest first.
    /// Rows deferred past `now` are left out.
    pub async fn find_pending_push(
        pool: &SqlitePool,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT
                id, user_id, notification_type, title, message, data,
                is_read, is_push_sent, scheduled_for, priority, category,
                created_at, updated_at
            FROM notifications
            WHERE is_push_sent = 0
              AND scheduled_for <= ?
              AND (push_deferred_until IS NULL OR push_deferred_until <= ?)
            ORDER BY scheduled_for ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
