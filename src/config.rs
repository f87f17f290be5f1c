use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin.
    pub frontend_url: String,
    /// How long to wait for in-flight scheduler ticks on shutdown.
    pub shutdown_grace_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared with the service that issues user tokens.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the background scheduler is started with the server.
    pub enabled: bool,
    /// IANA zone used for the weekly report and as the default reminder zone.
    pub timezone: String,
    /// Reminders dispatched concurrently within one batch.
    pub reminder_batch_size: usize,
    /// Upper bound of reminder candidates considered per tick.
    pub reminder_max_per_tick: i64,
    pub minute_task_timeout_seconds: u64,
    pub weekly_task_timeout_seconds: u64,
    /// Weekday name, e.g. `Sunday`.
    pub weekly_report_day: String,
    /// `HH:MM` in `timezone`.
    pub weekly_report_time: String,
    /// Pending pushes handled per dispatch tick.
    pub push_dispatch_batch_size: i64,
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = SchedulerConfig::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                shutdown_grace_seconds: env::var("SHUTDOWN_GRACE_SECONDS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .unwrap_or(15),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
            },
            scheduler: SchedulerConfig {
                enabled: env_flag("SCHEDULER_ENABLED", true),
                timezone: env::var("SCHEDULER_TIMEZONE").unwrap_or(defaults.timezone),
                reminder_batch_size: env::var("REMINDER_BATCH_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &usize| *v > 0)
                    .unwrap_or(defaults.reminder_batch_size),
                reminder_max_per_tick: env::var("REMINDER_MAX_PER_TICK")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &i64| *v > 0)
                    .unwrap_or(defaults.reminder_max_per_tick),
                minute_task_timeout_seconds: env::var("SCHEDULER_MINUTE_TASK_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.minute_task_timeout_seconds),
                weekly_task_timeout_seconds: env::var("SCHEDULER_WEEKLY_TASK_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.weekly_task_timeout_seconds),
                weekly_report_day: env::var("WEEKLY_REPORT_DAY")
                    .unwrap_or(defaults.weekly_report_day),
                weekly_report_time: env::var("WEEKLY_REPORT_TIME")
                    .unwrap_or(defaults.weekly_report_time),
                push_dispatch_batch_size: env::var("PUSH_DISPATCH_BATCH_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v: &i64| *v > 0)
                    .unwrap_or(defaults.push_dispatch_batch_size),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            enabled: true,
            timezone: "UTC".to_string(),
            reminder_batch_size: 10,
            reminder_max_per_tick: 100,
            minute_task_timeout_seconds: 30,
            weekly_task_timeout_seconds: 60,
            weekly_report_day: "Sunday".to_string(),
            weekly_report_time: "09:00".to_string(),
            push_dispatch_batch_size: 100,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                shutdown_grace_seconds: 15,
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}
