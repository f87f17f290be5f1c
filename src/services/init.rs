//! Initialization helpers for the application:
//! - database connection + migrations
//! - wiring of the notification services and the scheduler
//!
//! This module centralizes bits that would otherwise live in `main.rs`.

use std::{path::Path, sync::Arc};

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::notifications::NotificationService;
use crate::services::push::PushHub;
use crate::services::reminders::{ReminderService, ReminderSettings};
use crate::services::schedule::parse_timezone;
use crate::services::scheduler::NotificationScheduler;
use crate::services::store::{SchedulerStore, SqliteStore};
use crate::services::weekly_report::WeeklyReportService;

/// Redact potentially sensitive information from a database URL before logging.
///
/// Attempts to parse the URL and remove userinfo (username:password) components.
/// Falls back to removing everything before '@' or returning "(redacted)".
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        let scheme = url.scheme();
        let host = url.host_str().unwrap_or("");
        let port_part = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let path = url.path();
        format!("{}://{}{}{}", scheme, host, port_part, path)
    } else {
        if let Some(at_pos) = db_url.find('@') {
            let without_creds = &db_url[at_pos + 1..];
            return format!("(redacted){}", without_creds);
        }
        "(redacted)".to_string()
    }
}

/// Initialize SQLite database connection and run migrations.
///
/// Creates the parent directory for the database file (if applicable),
/// opens a connection pool using `create_if_missing(true)` and runs migrations.
pub async fn init_db(config: &Config) -> Result<SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Services shared by the HTTP layer and the background scheduler.
pub struct Services {
    pub reminders: ReminderService,
    pub notifications: NotificationService,
    pub scheduler: Arc<NotificationScheduler>,
}

/// Build the notification services on top of the database and push hub.
///
/// Fails if the configured scheduler timezone is unknown.
pub fn build_services(pool: &SqlitePool, push: Arc<PushHub>, config: &Config) -> Result<Services> {
    let default_tz = parse_timezone(&config.scheduler.timezone).map_err(|_| {
        anyhow::anyhow!(
            "SCHEDULER_TIMEZONE is not a known timezone: {}",
            config.scheduler.timezone
        )
    })?;

    let store: Arc<dyn SchedulerStore> = Arc::new(SqliteStore::new(pool.clone()));
    let notifications = NotificationService::new(store.clone(), push, default_tz);
    let reminders = ReminderService::new(
        store.clone(),
        notifications.clone(),
        ReminderSettings {
            batch_size: config.scheduler.reminder_batch_size.max(1),
            max_per_tick: config.scheduler.reminder_max_per_tick,
            default_timezone: default_tz,
        },
    );
    let weekly = WeeklyReportService::new(store, notifications.clone());

    let scheduler = Arc::new(NotificationScheduler::new(
        reminders.clone(),
        notifications.clone(),
        weekly,
        config.scheduler.clone(),
    ));

    Ok(Services {
        reminders,
        notifications,
        scheduler,
    })
}
