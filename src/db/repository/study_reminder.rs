use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Study Reminder Repository
// ============================================================================

pub struct StudyReminderRepository;

impl StudyReminderRepository {
    pub async fn create(pool: &SqlitePool, reminder: NewStudyReminder) -> AppResult<StudyReminder> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, StudyReminder>(
            r#"
            INSERT INTO study_reminders (
                id, user_id, is_enabled, reminder_time, days_of_week,
                study_goal_minutes, timezone, last_sent_at, next_scheduled_at,
                is_active, created_at, updated_at
            )
            VALUES (?, ?, 1, ?, ?, ?, ?, NULL, ?, 1, ?, ?)
            RETURNING
                id, user_id, is_enabled, reminder_time, days_of_week,
                study_goal_minutes, timezone, last_sent_at, next_scheduled_at,
                is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(reminder.user_id)
        .bind(reminder.reminder_time)
        .bind(reminder.days_of_week)
        .bind(reminder.study_goal_minutes)
        .bind(reminder.timezone)
        .bind(reminder.next_scheduled_at)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<StudyReminder>> {
        sqlx::query_as::<_, StudyReminder>(
            r#"
            SELECT
                id, user_id, is_enabled, reminder_time, days_of_week,
                study_goal_minutes, timezone, last_sent_at, next_scheduled_at,
                is_active, created_at, updated_at
            FROM study_reminders
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// The user's current (not soft-deleted) reminder, if any.
    pub async fn find_active_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<StudyReminder>> {
        sqlx::query_as::<_, StudyReminder>(
            r#"
            SELECT
                id, user_id, is_enabled, reminder_time, days_of_week,
                study_goal_minutes, timezone, last_sent_at, next_scheduled_at,
                is_active, created_at, updated_at
            FROM study_reminders
            WHERE user_id = ? AND is_active = 1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Persist the user-editable fields and the recomputed schedule.
    pub async fn update(pool: &SqlitePool, reminder: &StudyReminder) -> AppResult<StudyReminder> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, StudyReminder>(
            r#"
            UPDATE study_reminders
            SET is_enabled = ?,
                reminder_time = ?,
                days_of_week = ?,
                study_goal_minutes = ?,
                timezone = ?,
                next_scheduled_at = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id, user_id, is_enabled, reminder_time, days_of_week,
                study_goal_minutes, timezone, last_sent_at, next_scheduled_at,
                is_active, created_at, updated_at
            "#,
        )
        .bind(reminder.is_enabled)
        .bind(&reminder.reminder_time)
        .bind(&reminder.days_of_week)
        .bind(reminder.study_goal_minutes)
        .bind(&reminder.timezone)
        .bind(reminder.next_scheduled_at)
        .bind(now)
        .bind(&reminder.id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Soft delete. Returns false when nothing matched.
    pub async fn deactivate(pool: &SqlitePool, id: &str, user_id: &str) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE study_reminders
            SET is_active = 0, updated_at = ?
            WHERE id = ? AND user_id = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a dispatch for the minute starting at `minute_start`.
    ///
    /// The guard on `last_sent_at` makes the claim atomic: of two sweeps
    /// racing for the same occurrence only one gets a row back.
    pub async fn claim(
        pool: &SqlitePool,
        id: &str,
        minute_start: NaiveDateTime,
        sent_at: NaiveDateTime,
        next_scheduled_at: NaiveDateTime,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let claimed = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE study_reminders
            SET last_sent_at = ?, next_scheduled_at = ?, updated_at = ?
            WHERE id = ?
              AND (last_sent_at IS NULL OR last_sent_at < ?)
            RETURNING id
            "#,
        )
        .bind(sent_at)
        .bind(next_scheduled_at)
        .bind(now)
        .bind(id)
        .bind(minute_start)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(claimed.is_some())
    }

    /// Undo a claim whose notification could not be stored.
    pub async fn restore_schedule(
        pool: &SqlitePool,
        id: &str,
        last_sent_at: Option<NaiveDateTime>,
        next_scheduled_at: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            UPDATE study_reminders
            SET last_sent_at = ?, next_scheduled_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(last_sent_at)
        .bind(next_scheduled_at)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Distinct timezones among reminders the scheduler may fire.
    pub async fn active_timezones(pool: &SqlitePool) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT timezone
            FROM study_reminders
            WHERE is_enabled = 1 AND is_active = 1
            ORDER BY timezone
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Enabled, active reminders in `timezone` set for `reminder_time`
    /// (`HH:MM`), plus those whose `next_scheduled_at` lies in `[from, to)`.
    ///
    /// The second arm picks up times a DST gap skipped: their advertised fire
    /// time is the first minute after the gap.
    pub async fn find_due(
        pool: &SqlitePool,
        timezone: &str,
        reminder_time: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<StudyReminder>> {
        sqlx::query_as::<_, StudyReminder>(
            r#"
            SELECT
                id, user_id, is_enabled, reminder_time, days_of_week,
                study_goal_minutes, timezone, last_sent_at, next_scheduled_at,
                is_active, created_at, updated_at
            FROM study_reminders
            WHERE timezone = ?
              AND (
                  reminder_time = ?
                  OR (next_scheduled_at >= ? AND next_scheduled_at < ?)
              )
              AND is_enabled = 1
              AND is_active = 1
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(timezone)
        .bind(reminder_time)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
