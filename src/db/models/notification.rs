use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kinds of in-app notifications. Stored as SCREAMING_SNAKE_CASE text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    StudyReminder,
    AccessGranted,
    PaymentApproved,
    PaymentRejected,
    ExamResult,
    AchievementUnlocked,
    WeeklyReport,
    SystemAnnouncement,
}

impl NotificationType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STUDY_REMINDER" => Some(NotificationType::StudyReminder),
            "ACCESS_GRANTED" => Some(NotificationType::AccessGranted),
            "PAYMENT_APPROVED" => Some(NotificationType::PaymentApproved),
            "PAYMENT_REJECTED" => Some(NotificationType::PaymentRejected),
            "EXAM_RESULT" => Some(NotificationType::ExamResult),
            "ACHIEVEMENT_UNLOCKED" => Some(NotificationType::AchievementUnlocked),
            "WEEKLY_REPORT" => Some(NotificationType::WeeklyReport),
            "SYSTEM_ANNOUNCEMENT" => Some(NotificationType::SystemAnnouncement),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::StudyReminder => "STUDY_REMINDER",
            NotificationType::AccessGranted => "ACCESS_GRANTED",
            NotificationType::PaymentApproved => "PAYMENT_APPROVED",
            NotificationType::PaymentRejected => "PAYMENT_REJECTED",
            NotificationType::ExamResult => "EXAM_RESULT",
            NotificationType::AchievementUnlocked => "ACHIEVEMENT_UNLOCKED",
            NotificationType::WeeklyReport => "WEEKLY_REPORT",
            NotificationType::SystemAnnouncement => "SYSTEM_ANNOUNCEMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationPriority::Low => "LOW",
            NotificationPriority::Medium => "MEDIUM",
            NotificationPriority::High => "HIGH",
            NotificationPriority::Urgent => "URGENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    Study,
    Payment,
    Exam,
    Access,
    System,
    General,
}

impl NotificationCategory {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STUDY" => Some(NotificationCategory::Study),
            "PAYMENT" => Some(NotificationCategory::Payment),
            "EXAM" => Some(NotificationCategory::Exam),
            "ACCESS" => Some(NotificationCategory::Access),
            "SYSTEM" => Some(NotificationCategory::System),
            "GENERAL" => Some(NotificationCategory::General),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::Study => "STUDY",
            NotificationCategory::Payment => "PAYMENT",
            NotificationCategory::Exam => "EXAM",
            NotificationCategory::Access => "ACCESS",
            NotificationCategory::System => "SYSTEM",
            NotificationCategory::General => "GENERAL",
        }
    }
}

impl TryFrom<&str> for NotificationType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid notification type: {}", value))
    }
}

impl TryFrom<&str> for NotificationCategory {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid notification category: {}", value))
    }
}

/// Stored notification. `data` holds a JSON document (or NULL).
///
/// `scheduled_for` is the moment the notification becomes visible and eligible
/// for a live push; it defaults to the creation time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: Option<String>,
    pub is_read: bool,
    pub is_push_sent: bool,
    pub scheduled_for: NaiveDateTime,
    pub priority: String,
    pub category: String,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Notification {
    pub fn kind(&self) -> Option<NotificationType> {
        NotificationType::from_str(&self.notification_type)
    }

    /// Parsed `data` payload; malformed JSON is treated as absent.
    pub fn data_json(&self) -> Option<serde_json::Value> {
        self.data
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok())
    }
}

/// Data required to insert a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub priority: NotificationPriority,
    pub category: NotificationCategory,
    /// Defaults to now when omitted or in the past.
    pub scheduled_for: Option<NaiveDateTime>,
}
