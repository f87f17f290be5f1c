use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::{
    CreateNotification, ExamActivity, NotificationCategory, NotificationPriority,
    NotificationType,
};
use crate::error::AppResult;
use crate::i18n;
use crate::services::notifications::NotificationService;
use crate::services::store::SchedulerStore;

/// Sends each active student a summary of the past seven days of exams.
#[derive(Clone)]
pub struct WeeklyReportService {
    store: Arc<dyn SchedulerStore>,
    notifications: NotificationService,
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn report_for(
    user_id: &str,
    language: &str,
    activity: ExamActivity,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> CreateNotification {
    let average = round_one_decimal(activity.average_score);
    let (taken, passed, average_text) = (
        activity.exams_taken.to_string(),
        activity.exams_passed.to_string(),
        format!("{:.1}", average),
    );

    CreateNotification {
        user_id: user_id.to_string(),
        notification_type: NotificationType::WeeklyReport,
        title: i18n::tr(Some(language), "weekly_report.title", None),
        message: i18n::tr(
            Some(language),
            "weekly_report.message",
            Some(&[
                ("taken", taken.as_str()),
                ("passed", passed.as_str()),
                ("average", average_text.as_str()),
            ]),
        ),
        data: Some(serde_json::json!({
            "examsTaken": activity.exams_taken,
            "examsPassed": activity.exams_passed,
            "averageScore": average,
            "periodStart": from.to_rfc3339(),
            "periodEnd": to.to_rfc3339(),
        })),
        priority: NotificationPriority::Low,
        category: NotificationCategory::General,
        scheduled_for: None,
    }
}

impl WeeklyReportService {
    pub fn new(store: Arc<dyn SchedulerStore>, notifications: NotificationService) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Returns the number of reports created.
    pub async fn send_weekly_reports(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let from = now - Duration::days(7);
        let recipients = self.store.weekly_report_recipients().await?;
        let mut sent = 0;

        for user in &recipients {
            let activity = match self
                .store
                .exam_activity(&user.id, from.naive_utc(), now.naive_utc())
                .await
            {
                Ok(activity) => activity,
                Err(e) => {
                    tracing::warn!("Failed to load exam activity for user {}: {:?}", user.id, e);
                    continue;
                }
            };

            if activity.is_empty() {
                continue;
            }

            let language = match self.store.preferences_for(&user.id).await {
                Ok(prefs) => prefs.language,
                Err(e) => {
                    tracing::warn!("Failed to load preferences for user {}: {:?}", user.id, e);
                    i18n::DEFAULT_LANG.to_string()
                }
            };

            match self
                .notifications
                .create_notification(report_for(&user.id, &language, activity, from, now), now)
                .await
            {
                Ok(_) => sent += 1,
                Err(e) => {
                    tracing::warn!("Failed to create weekly report for user {}: {:?}", user.id, e)
                }
            }
        }

        tracing::info!(
            "Weekly reports sent: {} (of {} recipients)",
            sent,
            recipients.len()
        );
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NotificationPreferences;
    use crate::services::testing::{MemoryStore, RecordingPush};
    use chrono_tz::Tz;

    fn service(store: &Arc<MemoryStore>) -> WeeklyReportService {
        let notifications =
            NotificationService::new(store.clone(), Arc::new(RecordingPush::online(0)), Tz::UTC);
        WeeklyReportService::new(store.clone(), notifications)
    }

    #[tokio::test]
    async fn only_active_opted_in_users_get_reports() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("busy");
        store.add_user("idle");
        store.add_user("opted-out");
        store.set_activity(
            "busy",
            ExamActivity {
                exams_taken: 3,
                exams_passed: 2,
                average_score: 78.46,
            },
        );
        store.set_activity(
            "opted-out",
            ExamActivity {
                exams_taken: 1,
                exams_passed: 1,
                average_score: 90.0,
            },
        );
        store.set_preferences(NotificationPreferences {
            user_id: "opted-out".to_string(),
            weekly_reports: false,
            ..Default::default()
        });

        let sent = service(&store).send_weekly_reports(Utc::now()).await.unwrap();
        assert_eq!(sent, 1);

        assert!(store.notifications_for("idle").is_empty());
        assert!(store.notifications_for("opted-out").is_empty());

        let reports = store.notifications_for("busy");
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.notification_type, "WEEKLY_REPORT");
        assert_eq!(report.category, "GENERAL");
        assert_eq!(report.priority, "LOW");
        assert!(report.message.contains("took 3 exams"));
        assert!(report.message.contains("passed 2"));
        assert!(report.message.contains("78.5%"));

        let data = report.data_json().unwrap();
        assert_eq!(data["examsTaken"], 3);
        assert_eq!(data["examsPassed"], 2);
        assert_eq!(data["averageScore"], 78.5);
    }

    #[tokio::test]
    async fn aggregates_last_seven_days_on_sqlite() {
        use crate::db::testing::{insert_exam_result, insert_user, test_pool};
        use crate::services::store::SqliteStore;

        let pool = test_pool().await;
        let user = insert_user(&pool, "USER").await;
        let quiet = insert_user(&pool, "USER").await;

        let now = Utc::now();
        insert_exam_result(&pool, &user, 80.0, true, (now - Duration::days(1)).naive_utc()).await;
        insert_exam_result(&pool, &user, 55.0, false, (now - Duration::days(3)).naive_utc()).await;
        // Outside the window
        insert_exam_result(&pool, &user, 10.0, false, (now - Duration::days(9)).naive_utc()).await;
        insert_exam_result(&pool, &quiet, 99.0, true, (now - Duration::days(20)).naive_utc()).await;

        let store: Arc<dyn SchedulerStore> = Arc::new(SqliteStore::new(pool.clone()));
        let notifications =
            NotificationService::new(store.clone(), Arc::new(RecordingPush::online(0)), Tz::UTC);
        let sent = WeeklyReportService::new(store, notifications)
            .send_weekly_reports(now)
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let data: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT user_id, data FROM notifications WHERE notification_type = 'WEEKLY_REPORT'")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].0, user);
        let payload: serde_json::Value = serde_json::from_str(data[0].1.as_deref().unwrap()).unwrap();
        assert_eq!(payload["examsTaken"], 2);
        assert_eq!(payload["examsPassed"], 1);
        assert_eq!(payload["averageScore"], 67.5);
    }
}
