use chrono::{NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::NotificationType;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub id: String,
    pub user_id: String,
    pub push_notifications: bool,
    pub sms_notifications: bool,
    pub exam_reminders: bool,
    pub payment_updates: bool,
    pub system_announcements: bool,
    pub study_reminders: bool,
    pub achievement_alerts: bool,
    pub weekly_reports: bool,
    pub quiet_hours_enabled: bool,
    /// `HH:MM`, local to the user
    pub quiet_hours_start: String,
    /// `HH:MM`, local to the user
    pub quiet_hours_end: String,
    pub vibration_enabled: bool,
    pub sound_enabled: bool,
    /// Language code for notification text
    pub language: String,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateNotificationPreferences {
    #[serde(default, alias = "pushNotifications")]
    pub push_notifications: Option<bool>,
    #[serde(default, alias = "smsNotifications")]
    pub sms_notifications: Option<bool>,
    #[serde(default, alias = "examReminders")]
    pub exam_reminders: Option<bool>,
    #[serde(default, alias = "paymentUpdates")]
    pub payment_updates: Option<bool>,
    #[serde(default, alias = "systemAnnouncements")]
    pub system_announcements: Option<bool>,
    #[serde(default, alias = "studyReminders")]
    pub study_reminders: Option<bool>,
    #[serde(default, alias = "achievementAlerts")]
    pub achievement_alerts: Option<bool>,
    #[serde(default, alias = "weeklyReports")]
    pub weekly_reports: Option<bool>,
    #[serde(default, alias = "quietHoursEnabled")]
    pub quiet_hours_enabled: Option<bool>,
    #[serde(default, alias = "quietHoursStart")]
    pub quiet_hours_start: Option<String>,
    #[serde(default, alias = "quietHoursEnd")]
    pub quiet_hours_end: Option<String>,
    #[serde(default, alias = "vibrationEnabled")]
    pub vibration_enabled: Option<bool>,
    #[serde(default, alias = "soundEnabled")]
    pub sound_enabled: Option<bool>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            id: String::new(),
            user_id: String::new(),
            push_notifications: true,
            sms_notifications: false,
            exam_reminders: true,
            payment_updates: true,
            system_announcements: true,
            study_reminders: true,
            achievement_alerts: true,
            weekly_reports: true,
            quiet_hours_enabled: false,
            quiet_hours_start: "22:00".to_string(),
            quiet_hours_end: "07:00".to_string(),
            vibration_enabled: true,
            sound_enabled: true,
            language: crate::i18n::DEFAULT_LANG.to_string(),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }
}

impl NotificationPreferences {
    /// Whether a live push of this notification kind is wanted at all.
    pub fn allows_push(&self, kind: Option<NotificationType>) -> bool {
        if !self.push_notifications {
            return false;
        }

        match kind {
            Some(NotificationType::StudyReminder) => self.study_reminders,
            Some(NotificationType::ExamResult) => self.exam_reminders,
            Some(NotificationType::PaymentApproved)
            | Some(NotificationType::PaymentRejected)
            | Some(NotificationType::AccessGranted) => self.payment_updates,
            Some(NotificationType::AchievementUnlocked) => self.achievement_alerts,
            Some(NotificationType::WeeklyReport) => self.weekly_reports,
            Some(NotificationType::SystemAnnouncement) => self.system_announcements,
            None => true,
        }
    }

    /// Local time the quiet-hours window closes, when the window is in force.
    pub fn quiet_hours_end_time(&self) -> Option<NaiveTime> {
        if !self.quiet_hours_enabled {
            return None;
        }
        NaiveTime::parse_from_str(&self.quiet_hours_end, "%H:%M").ok()
    }

    /// Whether `local` falls inside the quiet-hours window.
    ///
    /// The window is `[start, end)` and wraps past midnight when `start > end`
    /// (e.g. 22:00–07:00). Unparseable bounds disable the window.
    pub fn in_quiet_hours(&self, local: NaiveTime) -> bool {
        if !self.quiet_hours_enabled {
            return false;
        }

        let (start, end) = match (
            NaiveTime::parse_from_str(&self.quiet_hours_start, "%H:%M"),
            NaiveTime::parse_from_str(&self.quiet_hours_end, "%H:%M"),
        ) {
            (Ok(s), Ok(e)) => (s, e),
            _ => return false,
        };

        if start == end {
            return false;
        }
        if start < end {
            local >= start && local < end
        } else {
            local >= start || local < end
        }
    }
}
