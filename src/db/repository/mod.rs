pub mod exam_result;
pub mod notification;
pub mod notification_preferences;
pub mod study_reminder;
pub mod user;

pub use exam_result::ExamResultRepository;
pub use notification::{NotificationFilter, NotificationRepository};
pub use notification_preferences::NotificationPreferencesRepository;
pub use study_reminder::StudyReminderRepository;
pub use user::UserRepository;
