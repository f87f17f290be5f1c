//! In-memory `SchedulerStore` and `PushChannel` doubles for service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use crate::db::{
    CreateNotification, ExamActivity, NewStudyReminder, Notification, NotificationPreferences,
    StudyReminder, User,
};
use crate::error::{AppError, AppResult};
use crate::services::push::PushChannel;
use crate::services::store::SchedulerStore;

#[derive(Default)]
struct State {
    reminders: Vec<StudyReminder>,
    preferences: HashMap<String, NotificationPreferences>,
    notifications: Vec<Notification>,
    users: Vec<User>,
    activity: HashMap<String, ExamActivity>,
    fail_notifications_for: HashSet<String>,
    push_deferred_until: HashMap<String, NaiveDateTime>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    calls: AtomicUsize,
    hang_timezones: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Total number of store calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make `active_reminder_timezones` never resolve.
    pub fn set_hang(&self, hang: bool) {
        self.hang_timezones.store(hang, Ordering::SeqCst);
    }

    pub fn fail_notifications_for(&self, user_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_notifications_for.insert(user_id.to_string());
    }

    pub fn add_user(&self, id: &str) -> User {
        let now = Utc::now().naive_utc();
        let user = User {
            id: id.to_string(),
            full_name: format!("User {id}"),
            phone_number: format!("+251900{id}"),
            device_id: None,
            role: "USER".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn set_preferences(&self, prefs: NotificationPreferences) {
        let mut state = self.state.lock().unwrap();
        state.preferences.insert(prefs.user_id.clone(), prefs);
    }

    pub fn set_activity(&self, user_id: &str, activity: ExamActivity) {
        let mut state = self.state.lock().unwrap();
        state.activity.insert(user_id.to_string(), activity);
    }

    pub fn insert_reminder(
        &self,
        user_id: &str,
        reminder_time: &str,
        days_of_week: &str,
        timezone: &str,
    ) -> StudyReminder {
        let now = Utc::now().naive_utc();
        let reminder = StudyReminder {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            is_enabled: true,
            reminder_time: reminder_time.to_string(),
            days_of_week: days_of_week.to_string(),
            study_goal_minutes: 30,
            timezone: timezone.to_string(),
            last_sent_at: None,
            next_scheduled_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().reminders.push(reminder.clone());
        reminder
    }

    pub fn reminder(&self, id: &str) -> Option<StudyReminder> {
        let state = self.state.lock().unwrap();
        state.reminders.iter().find(|r| r.id == id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }
}

#[async_trait]
impl SchedulerStore for MemoryStore {
    async fn create_reminder(&self, reminder: NewStudyReminder) -> AppResult<StudyReminder> {
        self.touch();
        let now = Utc::now().naive_utc();
        let row = StudyReminder {
            id: Uuid::new_v4().to_string(),
            user_id: reminder.user_id,
            is_enabled: true,
            reminder_time: reminder.reminder_time,
            days_of_week: reminder.days_of_week,
            study_goal_minutes: reminder.study_goal_minutes,
            timezone: reminder.timezone,
            last_sent_at: None,
            next_scheduled_at: Some(reminder.next_scheduled_at),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().reminders.push(row.clone());
        Ok(row)
    }

    async fn find_reminder(&self, id: &str) -> AppResult<Option<StudyReminder>> {
        self.touch();
        Ok(self.reminder(id))
    }

    async fn find_active_reminder(&self, user_id: &str) -> AppResult<Option<StudyReminder>> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(state
            .reminders
            .iter()
            .find(|r| r.user_id == user_id && r.is_active)
            .cloned())
    }

    async fn update_reminder(&self, reminder: &StudyReminder) -> AppResult<StudyReminder> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        let row = state
            .reminders
            .iter_mut()
            .find(|r| r.id == reminder.id)
            .ok_or_else(|| AppError::NotFound(reminder.id.clone()))?;
        *row = StudyReminder {
            last_sent_at: row.last_sent_at,
            is_active: row.is_active,
            updated_at: Utc::now().naive_utc(),
            ..reminder.clone()
        };
        Ok(row.clone())
    }

    async fn deactivate_reminder(&self, id: &str, user_id: &str) -> AppResult<bool> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        match state
            .reminders
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id && r.is_active)
        {
            Some(row) => {
                row.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_reminder_timezones(&self) -> AppResult<Vec<String>> {
        self.touch();
        if self.hang_timezones.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let state = self.state.lock().unwrap();
        let mut zones: Vec<String> = state
            .reminders
            .iter()
            .filter(|r| r.is_enabled && r.is_active)
            .map(|r| r.timezone.clone())
            .collect();
        zones.sort();
        zones.dedup();
        Ok(zones)
    }

    async fn find_reminders_due(
        &self,
        timezone: &str,
        reminder_time: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<StudyReminder>> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(state
            .reminders
            .iter()
            .filter(|r| {
                let scheduled_now = r.next_scheduled_at.is_some_and(|at| at >= from && at < to);
                r.timezone == timezone
                    && (r.reminder_time == reminder_time || scheduled_now)
                    && r.is_enabled
                    && r.is_active
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn claim_reminder(
        &self,
        id: &str,
        minute_start: NaiveDateTime,
        sent_at: NaiveDateTime,
        next_scheduled_at: NaiveDateTime,
    ) -> AppResult<bool> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        match state.reminders.iter_mut().find(|r| r.id == id) {
            Some(row) if row.last_sent_at.map_or(true, |last| last < minute_start) => {
                row.last_sent_at = Some(sent_at);
                row.next_scheduled_at = Some(next_scheduled_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_reminder(
        &self,
        id: &str,
        last_sent_at: Option<NaiveDateTime>,
        next_scheduled_at: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.reminders.iter_mut().find(|r| r.id == id) {
            row.last_sent_at = last_sent_at;
            row.next_scheduled_at = next_scheduled_at;
        }
        Ok(())
    }

    async fn preferences_for(&self, user_id: &str) -> AppResult<NotificationPreferences> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        let prefs = state
            .preferences
            .entry(user_id.to_string())
            .or_insert_with(|| NotificationPreferences {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                ..Default::default()
            });
        Ok(prefs.clone())
    }

    async fn create_notification(
        &self,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        if state.fail_notifications_for.contains(&notification.user_id) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "injected failure for {}",
                notification.user_id
            )));
        }
        let now = Utc::now().naive_utc();
        let row = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: notification.user_id,
            notification_type: notification.notification_type.as_str().to_string(),
            title: notification.title,
            message: notification.message,
            data: notification.data.map(|d| d.to_string()),
            is_read: false,
            is_push_sent: false,
            scheduled_for: notification
                .scheduled_for
                .filter(|at| *at > now)
                .unwrap_or(now),
            priority: notification.priority.as_str().to_string(),
            category: notification.category.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        state.notifications.push(row.clone());
        Ok(row)
    }

    async fn mark_push_sent(&self, notification_id: &str) -> AppResult<()> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
        {
            row.is_push_sent = true;
        }
        Ok(())
    }

    async fn defer_push(&self, notification_id: &str, until: NaiveDateTime) -> AppResult<()> {
        self.touch();
        let mut state = self.state.lock().unwrap();
        state
            .push_deferred_until
            .insert(notification_id.to_string(), until);
        Ok(())
    }

    async fn pending_pushes(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        self.touch();
        let state = self.state.lock().unwrap();
        let mut pending: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| !n.is_push_sent && n.scheduled_for <= now)
            .filter(|n| {
                state
                    .push_deferred_until
                    .get(&n.id)
                    .map_or(true, |until| *until <= now)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|n| n.scheduled_for);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn active_users(&self) -> AppResult<Vec<User>> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().filter(|u| u.is_active).cloned().collect())
    }

    async fn weekly_report_recipients(&self) -> AppResult<Vec<User>> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|u| u.is_active)
            .filter(|u| {
                state
                    .preferences
                    .get(&u.id)
                    .map(|p| p.weekly_reports)
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn exam_activity(
        &self,
        user_id: &str,
        _from: NaiveDateTime,
        _to: NaiveDateTime,
    ) -> AppResult<ExamActivity> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(state.activity.get(user_id).copied().unwrap_or_default())
    }
}

/// Push channel that records deliveries and reports a fixed connection count.
#[derive(Default)]
pub struct RecordingPush {
    connections: AtomicUsize,
    pushed: Mutex<Vec<(String, String)>>,
}

impl RecordingPush {
    pub fn online(connections: usize) -> Self {
        Self {
            connections: AtomicUsize::new(connections),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// `(user_id, notification_id)` pairs in delivery order.
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn push(&self, user_id: &str, notification: &Notification) -> usize {
        let reached = self.connections.load(Ordering::SeqCst);
        if reached > 0 {
            self.pushed
                .lock()
                .unwrap()
                .push((user_id.to_string(), notification.id.clone()));
        }
        reached
    }
}
