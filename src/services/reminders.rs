//! Study reminders: CRUD with validation, the per-minute matcher and the
//! per-reminder dispatcher.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use serde::Serialize;

use crate::db::{
    CreateNotification, CreateStudyReminder, NewStudyReminder, NotificationCategory,
    NotificationPriority, NotificationType, StudyReminder, UpdateStudyReminder,
};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::notifications::{NotificationService, PushOutcome};
use crate::services::schedule::{
    format_reminder_time, is_due_at, minute_start, next_occurrence, parse_reminder_time,
    parse_timezone, LocalMinute, WeekdaySet,
};
use crate::services::store::SchedulerStore;

pub const MIN_STUDY_GOAL_MINUTES: i64 = 5;
pub const MAX_STUDY_GOAL_MINUTES: i64 = 480;
pub const DEFAULT_STUDY_GOAL_MINUTES: i64 = 30;

/// Result of dispatching one matched reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A notification was created; `pushed` if it reached a live connection.
    Notified { pushed: bool },
    /// The user turned study reminders off; only the schedule moved on.
    Suppressed,
    /// Not due in this minute, or already sent for it.
    Skipped,
}

/// Summary of one matcher sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderSweep {
    pub matched: usize,
    pub notified: usize,
    pub suppressed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub batch_size: usize,
    pub max_per_tick: i64,
    pub default_timezone: Tz,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_per_tick: 100,
            default_timezone: Tz::UTC,
        }
    }
}

#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn SchedulerStore>,
    notifications: NotificationService,
    settings: ReminderSettings,
}

struct ParsedSchedule {
    time: chrono::NaiveTime,
    days: WeekdaySet,
    tz: Tz,
}

impl ParsedSchedule {
    fn of(reminder: &StudyReminder) -> AppResult<Self> {
        Ok(Self {
            time: parse_reminder_time(&reminder.reminder_time)?,
            days: WeekdaySet::from_json(&reminder.days_of_week)?,
            tz: parse_timezone(&reminder.timezone)?,
        })
    }

    fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_occurrence(self.time, self.days.days(), self.tz, now)
    }
}

fn validate_goal(minutes: i64) -> AppResult<i64> {
    if (MIN_STUDY_GOAL_MINUTES..=MAX_STUDY_GOAL_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        let (min, max) = (
            MIN_STUDY_GOAL_MINUTES.to_string(),
            MAX_STUDY_GOAL_MINUTES.to_string(),
        );
        Err(AppError::Validation(i18n::t_with(
            "validation.study_goal",
            &[("min", min.as_str()), ("max", max.as_str())],
        )))
    }
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn SchedulerStore>,
        notifications: NotificationService,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            store,
            notifications,
            settings,
        }
    }

    pub async fn get_study_reminder(&self, user_id: &str) -> AppResult<StudyReminder> {
        self.store
            .find_active_reminder(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.reminder")))
    }

    pub async fn create_study_reminder(
        &self,
        user_id: &str,
        request: CreateStudyReminder,
    ) -> AppResult<StudyReminder> {
        let time = parse_reminder_time(&request.reminder_time)?;
        let days = WeekdaySet::parse(&request.days_of_week)?;
        let tz = match request.timezone.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_timezone(raw)?,
            _ => self.settings.default_timezone,
        };
        let goal = validate_goal(
            request
                .study_goal_minutes
                .unwrap_or(DEFAULT_STUDY_GOAL_MINUTES),
        )?;

        if self.store.find_active_reminder(user_id).await?.is_some() {
            return Err(AppError::Conflict(i18n::t("conflict.reminder_exists")));
        }

        let next = next_occurrence(time, days.days(), tz, Utc::now());
        let reminder = self
            .store
            .create_reminder(NewStudyReminder {
                user_id: user_id.to_string(),
                reminder_time: format_reminder_time(time),
                days_of_week: days.to_json(),
                study_goal_minutes: goal,
                timezone: tz.name().to_string(),
                next_scheduled_at: next.naive_utc(),
            })
            .await?;

        tracing::info!(
            "Created study reminder {} for user {} at {} {} ({})",
            reminder.id,
            user_id,
            reminder.reminder_time,
            reminder.timezone,
            reminder.days_of_week
        );
        Ok(reminder)
    }

    pub async fn update_study_reminder(
        &self,
        reminder_id: &str,
        user_id: &str,
        update: UpdateStudyReminder,
    ) -> AppResult<StudyReminder> {
        let mut reminder = self
            .store
            .find_reminder(reminder_id)
            .await?
            .filter(|r| r.user_id == user_id && r.is_active)
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.reminder")))?;

        let mut reschedule = false;

        if let Some(raw) = update.reminder_time.as_deref() {
            let time = format_reminder_time(parse_reminder_time(raw)?);
            reschedule |= time != reminder.reminder_time;
            reminder.reminder_time = time;
        }
        if let Some(names) = update.days_of_week.as_ref() {
            let days = WeekdaySet::parse(names)?.to_json();
            reschedule |= days != reminder.days_of_week;
            reminder.days_of_week = days;
        }
        if let Some(raw) = update.timezone.as_deref() {
            let tz = parse_timezone(raw)?.name().to_string();
            reschedule |= tz != reminder.timezone;
            reminder.timezone = tz;
        }
        if let Some(goal) = update.study_goal_minutes {
            reminder.study_goal_minutes = validate_goal(goal)?;
        }
        if let Some(enabled) = update.is_enabled {
            reschedule |= enabled && !reminder.is_enabled;
            reminder.is_enabled = enabled;
        }

        if reschedule || reminder.next_scheduled_at.is_none() {
            let schedule = ParsedSchedule::of(&reminder)?;
            reminder.next_scheduled_at = Some(schedule.next_after(Utc::now()).naive_utc());
        }

        self.store.update_reminder(&reminder).await
    }

    /// Soft delete; the matcher never selects the reminder again.
    pub async fn delete_study_reminder(&self, reminder_id: &str, user_id: &str) -> AppResult<()> {
        if self.store.deactivate_reminder(reminder_id, user_id).await? {
            tracing::info!("Deactivated study reminder {} for user {}", reminder_id, user_id);
            Ok(())
        } else {
            Err(AppError::NotFound(i18n::t("not_found.reminder")))
        }
    }

    /// Find every reminder due in the minute containing `now` and dispatch it.
    ///
    /// Safe to run concurrently with itself: each occurrence is claimed
    /// atomically, so overlapping sweeps notify once.
    pub async fn check_study_reminders(&self, now: DateTime<Utc>) -> AppResult<ReminderSweep> {
        let mut sweep = ReminderSweep::default();
        let mut due = Vec::new();
        let mut budget = self.settings.max_per_tick;
        let window_start = minute_start(now).naive_utc();
        let window_end = window_start + chrono::Duration::minutes(1);

        for label in self.store.active_reminder_timezones().await? {
            if budget <= 0 {
                tracing::warn!(
                    "Reminder candidate cap of {} reached; remaining timezones wait for the next tick",
                    self.settings.max_per_tick
                );
                break;
            }

            let tz = match parse_timezone(&label) {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::warn!("Skipping reminders with unknown timezone {:?}", label);
                    continue;
                }
            };

            let local = LocalMinute::of(now, tz);
            let candidates = self
                .store
                .find_reminders_due(&label, &local.hhmm(), window_start, window_end, budget)
                .await?;
            budget -= candidates.len() as i64;

            for reminder in candidates {
                match ParsedSchedule::of(&reminder) {
                    Ok(schedule) if is_due_at(schedule.time, &schedule.days, tz, now) => {
                        due.push(reminder)
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Study reminder {} has an invalid schedule: {:?}", reminder.id, e);
                        sweep.failed += 1;
                    }
                }
            }
        }

        sweep.matched = due.len();
        if due.is_empty() {
            tracing::debug!("No study reminders due at {}", now.format("%F %H:%M"));
            return Ok(sweep);
        }

        for batch in due.chunks(self.settings.batch_size.max(1)) {
            let results = join_all(batch.iter().map(|r| self.dispatch_reminder(r, now))).await;

            for (reminder, result) in batch.iter().zip(results) {
                match result {
                    Ok(DispatchOutcome::Notified { .. }) => sweep.notified += 1,
                    Ok(DispatchOutcome::Suppressed) => sweep.suppressed += 1,
                    Ok(DispatchOutcome::Skipped) => sweep.skipped += 1,
                    Err(e) => {
                        tracing::warn!("Failed to dispatch study reminder {}: {:?}", reminder.id, e);
                        sweep.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Study reminder sweep: matched={} notified={} suppressed={} skipped={} failed={}",
            sweep.matched,
            sweep.notified,
            sweep.suppressed,
            sweep.skipped,
            sweep.failed
        );
        Ok(sweep)
    }

    /// Deliver one reminder for the minute containing `now` and move its schedule on.
    pub async fn dispatch_reminder(
        &self,
        reminder: &StudyReminder,
        now: DateTime<Utc>,
    ) -> AppResult<DispatchOutcome> {
        let schedule = ParsedSchedule::of(reminder)?;

        if !reminder.is_enabled
            || !reminder.is_active
            || !is_due_at(schedule.time, &schedule.days, schedule.tz, now)
        {
            return Ok(DispatchOutcome::Skipped);
        }

        let prefs = self.store.preferences_for(&reminder.user_id).await?;
        let next = schedule.next_after(now);

        let claimed = self
            .store
            .claim_reminder(
                &reminder.id,
                minute_start(now).naive_utc(),
                now.naive_utc(),
                next.naive_utc(),
            )
            .await?;
        if !claimed {
            tracing::debug!("Study reminder {} already sent this minute", reminder.id);
            return Ok(DispatchOutcome::Skipped);
        }

        if !prefs.study_reminders {
            tracing::debug!(
                "Study reminders disabled for user {}; rescheduling {} only",
                reminder.user_id,
                reminder.id
            );
            return Ok(DispatchOutcome::Suppressed);
        }

        let minutes = reminder.study_goal_minutes.to_string();
        let created = self
            .store
            .create_notification(CreateNotification {
                user_id: reminder.user_id.clone(),
                notification_type: NotificationType::StudyReminder,
                title: i18n::tr(Some(prefs.language.as_str()), "study_reminder.title", None),
                message: i18n::tr(
                    Some(prefs.language.as_str()),
                    "study_reminder.message",
                    Some(&[("minutes", minutes.as_str())]),
                ),
                data: Some(serde_json::json!({
                    "reminderId": reminder.id,
                    "studyGoalMinutes": reminder.study_goal_minutes,
                })),
                priority: NotificationPriority::Medium,
                category: NotificationCategory::Study,
                scheduled_for: None,
            })
            .await;

        let notification = match created {
            Ok(notification) => notification,
            Err(e) => {
                // Release the occurrence so the next sweep in this minute can retry
                if let Err(restore) = self
                    .store
                    .restore_reminder(&reminder.id, reminder.last_sent_at, reminder.next_scheduled_at)
                    .await
                {
                    tracing::warn!(
                        "Failed to restore schedule of study reminder {}: {:?}",
                        reminder.id,
                        restore
                    );
                }
                return Err(e);
            }
        };

        let pushed = match self
            .notifications
            .deliver_with(&notification, &prefs, schedule.tz, now)
            .await
        {
            Ok(PushOutcome::Delivered(_)) => true,
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(
                    "Push of study reminder {} for user {} failed: {:?}",
                    reminder.id,
                    reminder.user_id,
                    e
                );
                false
            }
        };

        Ok(DispatchOutcome::Notified { pushed })
    }
}
