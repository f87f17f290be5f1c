//! Persistence seam used by the reminder, notification and report services.
//!
//! Everything the scheduler reads or writes goes through `SchedulerStore` so
//! the services can run against SQLite in production and an in-memory fake in
//! tests.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::db::{
    CreateNotification, ExamActivity, ExamResultRepository, NewStudyReminder, Notification,
    NotificationPreferences, NotificationPreferencesRepository, NotificationRepository,
    StudyReminder, StudyReminderRepository, User, UserRepository,
};
use crate::error::AppResult;

#[async_trait]
pub trait SchedulerStore: Send + Sync + 'static {
    // Reminders
    async fn create_reminder(&self, reminder: NewStudyReminder) -> AppResult<StudyReminder>;
    async fn find_reminder(&self, id: &str) -> AppResult<Option<StudyReminder>>;
    async fn find_active_reminder(&self, user_id: &str) -> AppResult<Option<StudyReminder>>;
    async fn update_reminder(&self, reminder: &StudyReminder) -> AppResult<StudyReminder>;
    async fn deactivate_reminder(&self, id: &str, user_id: &str) -> AppResult<bool>;
    async fn active_reminder_timezones(&self) -> AppResult<Vec<String>>;
    /// Reminders in `timezone` set for `reminder_time`, or whose advertised
    /// `next_scheduled_at` falls in `[from, to)`.
    async fn find_reminders_due(
        &self,
        timezone: &str,
        reminder_time: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<StudyReminder>>;
    /// Atomically record a dispatch unless one was already recorded at or
    /// after `minute_start`. Returns false when another sweep got there first.
    async fn claim_reminder(
        &self,
        id: &str,
        minute_start: NaiveDateTime,
        sent_at: NaiveDateTime,
        next_scheduled_at: NaiveDateTime,
    ) -> AppResult<bool>;
    /// Put back the schedule a failed dispatch claimed.
    async fn restore_reminder(
        &self,
        id: &str,
        last_sent_at: Option<NaiveDateTime>,
        next_scheduled_at: Option<NaiveDateTime>,
    ) -> AppResult<()>;

    // Preferences
    async fn preferences_for(&self, user_id: &str) -> AppResult<NotificationPreferences>;

    // Notifications
    async fn create_notification(&self, notification: CreateNotification)
        -> AppResult<Notification>;
    async fn mark_push_sent(&self, notification_id: &str) -> AppResult<()>;
    /// Keep a notification out of the pending-push scan until `until`.
    async fn defer_push(&self, notification_id: &str, until: NaiveDateTime) -> AppResult<()>;
    async fn pending_pushes(&self, now: NaiveDateTime, limit: i64)
        -> AppResult<Vec<Notification>>;

    // Users and exam activity
    async fn active_users(&self) -> AppResult<Vec<User>>;
    async fn weekly_report_recipients(&self) -> AppResult<Vec<User>>;
    async fn exam_activity(
        &self,
        user_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<ExamActivity>;
}

/// `SchedulerStore` backed by the SQLite repositories.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchedulerStore for SqliteStore {
    async fn create_reminder(&self, reminder: NewStudyReminder) -> AppResult<StudyReminder> {
        StudyReminderRepository::create(&self.pool, reminder).await
    }

    async fn find_reminder(&self, id: &str) -> AppResult<Option<StudyReminder>> {
        StudyReminderRepository::find_by_id(&self.pool, id).await
    }

    async fn find_active_reminder(&self, user_id: &str) -> AppResult<Option<StudyReminder>> {
        StudyReminderRepository::find_active_for_user(&self.pool, user_id).await
    }

    async fn update_reminder(&self, reminder: &StudyReminder) -> AppResult<StudyReminder> {
        StudyReminderRepository::update(&self.pool, reminder).await
    }

    async fn deactivate_reminder(&self, id: &str, user_id: &str) -> AppResult<bool> {
        StudyReminderRepository::deactivate(&self.pool, id, user_id).await
    }

    async fn active_reminder_timezones(&self) -> AppResult<Vec<String>> {
        StudyReminderRepository::active_timezones(&self.pool).await
    }

    async fn find_reminders_due(
        &self,
        timezone: &str,
        reminder_time: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<StudyReminder>> {
        StudyReminderRepository::find_due(&self.pool, timezone, reminder_time, from, to, limit)
            .await
    }

    async fn claim_reminder(
        &self,
        id: &str,
        minute_start: NaiveDateTime,
        sent_at: NaiveDateTime,
        next_scheduled_at: NaiveDateTime,
    ) -> AppResult<bool> {
        StudyReminderRepository::claim(&self.pool, id, minute_start, sent_at, next_scheduled_at)
            .await
    }

    async fn restore_reminder(
        &self,
        id: &str,
        last_sent_at: Option<NaiveDateTime>,
        next_scheduled_at: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        StudyReminderRepository::restore_schedule(&self.pool, id, last_sent_at, next_scheduled_at)
            .await
    }

    async fn preferences_for(&self, user_id: &str) -> AppResult<NotificationPreferences> {
        NotificationPreferencesRepository::get_or_create(&self.pool, user_id).await
    }

    async fn create_notification(
        &self,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        NotificationRepository::create(&self.pool, notification).await
    }

    async fn mark_push_sent(&self, notification_id: &str) -> AppResult<()> {
        NotificationRepository::mark_push_sent(&self.pool, notification_id).await
    }

    async fn defer_push(&self, notification_id: &str, until: NaiveDateTime) -> AppResult<()> {
        NotificationRepository::defer_push(&self.pool, notification_id, until).await
    }

    async fn pending_pushes(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        NotificationRepository::find_pending_push(&self.pool, now, limit).await
    }

    async fn active_users(&self) -> AppResult<Vec<User>> {
        UserRepository::list_active(&self.pool).await
    }

    async fn weekly_report_recipients(&self) -> AppResult<Vec<User>> {
        UserRepository::list_weekly_report_recipients(&self.pool).await
    }

    async fn exam_activity(
        &self,
        user_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<ExamActivity> {
        ExamResultRepository::activity_between(&self.pool, user_id, from, to).await
    }
}
