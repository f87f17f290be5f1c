//! Database models, one file per table.
//! Everything is re-exported at `crate::db::models` (and `crate::db`).

pub mod exam_result;
pub mod notification;
pub mod notification_preferences;
pub mod study_reminder;
pub mod user;

pub use self::exam_result::*;
pub use self::notification::*;
pub use self::notification_preferences::*;
pub use self::study_reminder::*;
pub use self::user::*;
