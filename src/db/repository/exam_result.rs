use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};

use crate::db::models::*;
use crate::error::{AppError, AppResult};

pub struct ExamResultRepository;

impl ExamResultRepository {
    /// Count, pass count and average score of the user's results in `[from, to)`.
    pub async fn activity_between(
        pool: &SqlitePool,
        user_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<ExamActivity> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS exams_taken,
                COALESCE(SUM(CASE WHEN passed THEN 1 ELSE 0 END), 0) AS exams_passed,
                COALESCE(AVG(score), 0.0) AS average_score
            FROM exam_results
            WHERE user_id = ?
              AND created_at >= ?
              AND created_at < ?
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(ExamActivity {
            exams_taken: row.try_get("exams_taken")?,
            exams_passed: row.try_get("exams_passed")?,
            average_score: row.try_get("average_score")?,
        })
    }
}
