use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::db::{
    CreateNotification, Notification, NotificationCategory, NotificationPreferences,
    NotificationPriority, NotificationType,
};
use crate::error::{AppError, AppResult};
use crate::services::push::PushChannel;
use crate::services::schedule::{next_occurrence, parse_timezone, LocalMinute, EVERY_DAY};
use crate::services::store::SchedulerStore;

/// What happened when a stored notification was offered to the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Handed to at least one open connection.
    Delivered(usize),
    /// The user's preferences rule this push out.
    Suppressed,
    /// Inside the user's quiet hours; retried later.
    Deferred,
    /// No open connection.
    Offline,
}

/// Summary of one pending-push dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSweep {
    pub examined: usize,
    pub delivered: usize,
    pub suppressed: usize,
    pub deferred: usize,
    pub failed: usize,
}

/// Admin broadcast request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnouncement {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    #[serde(default, alias = "scheduledFor")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Creates notifications and moves them onto the live push channel.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn SchedulerStore>,
    push: Arc<dyn PushChannel>,
    default_tz: Tz,
}

impl NotificationService {
    pub fn new(store: Arc<dyn SchedulerStore>, push: Arc<dyn PushChannel>, default_tz: Tz) -> Self {
        Self {
            store,
            push,
            default_tz,
        }
    }

    /// Store a notification and, if it is already due, try to push it.
    ///
    /// Push problems never fail the call; the pending-push task picks up
    /// anything left undelivered.
    pub async fn create_notification(
        &self,
        notification: CreateNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        let created = self.store.create_notification(notification).await?;

        if created.scheduled_for <= now.naive_utc() {
            if let Err(e) = self.deliver(&created, now).await {
                tracing::warn!(
                    "Push attempt for notification {} failed: {:?}",
                    created.id,
                    e
                );
            }
        }

        Ok(created)
    }

    /// Offer a stored notification to the user's live connections.
    pub async fn deliver(&self, notification: &Notification, now: DateTime<Utc>) -> AppResult<PushOutcome> {
        let prefs = self.store.preferences_for(&notification.user_id).await?;
        let tz = self.user_timezone(&notification.user_id).await;
        self.deliver_with(notification, &prefs, tz, now).await
    }

    /// `deliver` with preferences and the user's timezone already at hand.
    pub async fn deliver_with(
        &self,
        notification: &Notification,
        prefs: &NotificationPreferences,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> AppResult<PushOutcome> {
        if !prefs.allows_push(notification.kind()) {
            self.store.mark_push_sent(&notification.id).await?;
            return Ok(PushOutcome::Suppressed);
        }

        if prefs.in_quiet_hours(LocalMinute::of(now, tz).time) {
            tracing::debug!(
                "Deferring push of {} for user {} (quiet hours)",
                notification.id,
                notification.user_id
            );
            if let Some(end) = prefs.quiet_hours_end_time() {
                let until = next_occurrence(end, &EVERY_DAY, tz, now);
                self.store
                    .defer_push(&notification.id, until.naive_utc())
                    .await?;
            }
            return Ok(PushOutcome::Deferred);
        }

        let reached = self.push.push(&notification.user_id, notification).await;
        if reached == 0 {
            return Ok(PushOutcome::Offline);
        }

        self.store.mark_push_sent(&notification.id).await?;
        Ok(PushOutcome::Delivered(reached))
    }

    /// Push every due notification that has not been pushed yet.
    ///
    /// Offline users are marked as pushed too: the push is best effort and
    /// the notification stays in their list.
    pub async fn dispatch_pending_pushes(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<PushSweep> {
        let pending = self.store.pending_pushes(now.naive_utc(), limit).await?;
        let mut sweep = PushSweep {
            examined: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            tracing::debug!("No pending pushes");
            return Ok(sweep);
        }

        for notification in &pending {
            match self.deliver(notification, now).await {
                Ok(PushOutcome::Delivered(_)) => sweep.delivered += 1,
                Ok(PushOutcome::Suppressed) => sweep.suppressed += 1,
                Ok(PushOutcome::Deferred) => sweep.deferred += 1,
                Ok(PushOutcome::Offline) => {
                    if let Err(e) = self.store.mark_push_sent(&notification.id).await {
                        tracing::warn!(
                            "Failed to mark notification {} as pushed: {:?}",
                            notification.id,
                            e
                        );
                        sweep.failed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to dispatch notification {}: {:?}",
                        notification.id,
                        e
                    );
                    sweep.failed += 1;
                }
            }
        }

        Ok(sweep)
    }

    /// Create a system announcement for every active user. Returns how many
    /// notifications were created.
    pub async fn announce(&self, announcement: CreateAnnouncement, now: DateTime<Utc>) -> AppResult<usize> {
        let title = announcement.title.trim();
        let message = announcement.message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(AppError::Validation(
                "Announcement title and message are required".to_string(),
            ));
        }

        let scheduled_for: Option<NaiveDateTime> =
            announcement.scheduled_for.map(|at| at.naive_utc());
        let users = self.store.active_users().await?;
        let mut created = 0;

        for user in &users {
            let request = CreateNotification {
                user_id: user.id.clone(),
                notification_type: NotificationType::SystemAnnouncement,
                title: title.to_string(),
                message: message.to_string(),
                data: announcement.data.clone(),
                priority: announcement.priority.unwrap_or(NotificationPriority::High),
                category: NotificationCategory::System,
                scheduled_for,
            };

            match self.create_notification(request, now).await {
                Ok(_) => created += 1,
                Err(e) => {
                    tracing::warn!("Failed to create announcement for user {}: {:?}", user.id, e)
                }
            }
        }

        tracing::info!("Announcement created for {}/{} users", created, users.len());
        Ok(created)
    }

    /// Timezone used for a user's quiet hours: their reminder's zone, else the default.
    async fn user_timezone(&self, user_id: &str) -> Tz {
        match self.store.find_active_reminder(user_id).await {
            Ok(Some(reminder)) => parse_timezone(&reminder.timezone).unwrap_or(self.default_tz),
            _ => self.default_tz,
        }
    }
}
