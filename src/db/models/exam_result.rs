use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: String,
    pub user_id: String,
    pub exam_id: String,
    /// Percentage score, 0..=100
    pub score: f64,
    pub passed: bool,
    pub created_at: NaiveDateTime,
}

/// Aggregated exam activity for one user over a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamActivity {
    pub exams_taken: i64,
    pub exams_passed: i64,
    pub average_score: f64,
}

impl ExamActivity {
    pub fn is_empty(&self) -> bool {
        self.exams_taken == 0
    }
}
