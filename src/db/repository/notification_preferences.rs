use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Notification Preferences Repository
// ============================================================================

pub struct NotificationPreferencesRepository;

impl NotificationPreferencesRepository {
    /// Insert the default row for a user. A concurrent insert for the same
    /// user is absorbed by the UNIQUE(user_id) conflict clause.
    pub async fn create(pool: &SqlitePool, user_id: &str) -> AppResult<NotificationPreferences> {
        let id = Uuid::new_v4().to_string();
        let defaults = NotificationPreferences::default();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO notification_preferences (
                id, user_id,
                push_notifications, sms_notifications, exam_reminders, payment_updates,
                system_announcements, study_reminders, achievement_alerts, weekly_reports,
                quiet_hours_enabled, quiet_hours_start, quiet_hours_end,
                vibration_enabled, sound_enabled, language,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(defaults.push_notifications)
        .bind(defaults.sms_notifications)
        .bind(defaults.exam_reminders)
        .bind(defaults.payment_updates)
        .bind(defaults.system_announcements)
        .bind(defaults.study_reminders)
        .bind(defaults.achievement_alerts)
        .bind(defaults.weekly_reports)
        .bind(defaults.quiet_hours_enabled)
        .bind(&defaults.quiet_hours_start)
        .bind(&defaults.quiet_hours_end)
        .bind(defaults.vibration_enabled)
        .bind(defaults.sound_enabled)
        .bind(&defaults.language)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Self::find_by_user_id(pool, user_id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "notification preferences missing after insert for user {}",
                user_id
            ))
        })
    }

    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<NotificationPreferences>> {
        sqlx::query_as::<_, NotificationPreferences>(
            r#"
            SELECT
                id, user_id,
                push_notifications, sms_notifications, exam_reminders, payment_updates,
                system_announcements, study_reminders, achievement_alerts, weekly_reports,
                quiet_hours_enabled, quiet_hours_start, quiet_hours_end,
                vibration_enabled, sound_enabled, language,
                created_at, updated_at
            FROM notification_preferences
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn get_or_create(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<NotificationPreferences> {
        if let Some(prefs) = Self::find_by_user_id(pool, user_id).await? {
            Ok(prefs)
        } else {
            Self::create(pool, user_id).await
        }
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: &str,
        update: UpdateNotificationPreferences,
    ) -> AppResult<NotificationPreferences> {
        let current = Self::get_or_create(pool, user_id).await?;

        let merged = NotificationPreferences {
            push_notifications: update
                .push_notifications
                .unwrap_or(current.push_notifications),
            sms_notifications: update
                .sms_notifications
                .unwrap_or(current.sms_notifications),
            exam_reminders: update.exam_reminders.unwrap_or(current.exam_reminders),
            payment_updates: update.payment_updates.unwrap_or(current.payment_updates),
            system_announcements: update
                .system_announcements
                .unwrap_or(current.system_announcements),
            study_reminders: update.study_reminders.unwrap_or(current.study_reminders),
            achievement_alerts: update
                .achievement_alerts
                .unwrap_or(current.achievement_alerts),
            weekly_reports: update.weekly_reports.unwrap_or(current.weekly_reports),
            quiet_hours_enabled: update
                .quiet_hours_enabled
                .unwrap_or(current.quiet_hours_enabled),
            quiet_hours_start: update
                .quiet_hours_start
                .unwrap_or_else(|| current.quiet_hours_start.clone()),
            quiet_hours_end: update
                .quiet_hours_end
                .unwrap_or_else(|| current.quiet_hours_end.clone()),
            vibration_enabled: update
                .vibration_enabled
                .unwrap_or(current.vibration_enabled),
            sound_enabled: update.sound_enabled.unwrap_or(current.sound_enabled),
            language: update
                .language
                .unwrap_or_else(|| current.language.clone()),
            ..current
        };

        let now = Utc::now().naive_utc();
        sqlx::query_as::<_, NotificationPreferences>(
            r#"
            UPDATE notification_preferences
            SET push_notifications = ?,
                sms_notifications = ?,
                exam_reminders = ?,
                payment_updates = ?,
                system_announcements = ?,
                study_reminders = ?,
                achievement_alerts = ?,
                weekly_reports = ?,
                quiet_hours_enabled = ?,
                quiet_hours_start = ?,
                quiet_hours_end = ?,
                vibration_enabled = ?,
                sound_enabled = ?,
                language = ?,
                updated_at = ?
            WHERE user_id = ?
            RETURNING
                id, user_id,
                push_notifications, sms_notifications, exam_reminders, payment_updates,
                system_announcements, study_reminders, achievement_alerts, weekly_reports,
                quiet_hours_enabled, quiet_hours_start, quiet_hours_end,
                vibration_enabled, sound_enabled, language,
                created_at, updated_at
            "#,
        )
        .bind(merged.push_notifications)
        .bind(merged.sms_notifications)
        .bind(merged.exam_reminders)
        .bind(merged.payment_updates)
        .bind(merged.system_announcements)
        .bind(merged.study_reminders)
        .bind(merged.achievement_alerts)
        .bind(merged.weekly_reports)
        .bind(merged.quiet_hours_enabled)
        .bind(&merged.quiet_hours_start)
        .bind(&merged.quiet_hours_end)
        .bind(merged.vibration_enabled)
        .bind(merged.sound_enabled)
        .bind(&merged.language)
        .bind(now)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
