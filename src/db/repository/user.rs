use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository (read-only; accounts are managed by the main application)
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, full_name, phone_number, device_id, role, is_active,
                created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_active(pool: &SqlitePool) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                id, full_name, phone_number, device_id, role, is_active,
                created_at, updated_at
            FROM users
            WHERE is_active = 1
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Active users that have not switched weekly reports off.
    ///
    /// Users without a preferences row yet get the default (enabled).
    pub async fn list_weekly_report_recipients(pool: &SqlitePool) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT
                u.id, u.full_name, u.phone_number, u.device_id, u.role, u.is_active,
                u.created_at, u.updated_at
            FROM users u
            LEFT JOIN notification_preferences p ON p.user_id = u.id
            WHERE u.is_active = 1
              AND COALESCE(p.weekly_reports, 1) = 1
            ORDER BY u.created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
