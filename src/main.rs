use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod i18n;
mod middleware;
mod routes;
mod services;

use config::Config;
use services::{
    init, notifications::NotificationService, push::PushHub, reminders::ReminderService,
    scheduler::NotificationScheduler,
};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub push: Arc<PushHub>,
    pub reminders: ReminderService,
    pub notifications: NotificationService,
    pub scheduler: Arc<NotificationScheduler>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "exam_prep_notifications=debug,tower_http=debug".into());

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to bind SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Serve until `signal` resolves, then stop accepting and let in-flight
/// requests finish. Upgraded push sockets are not waited on.
async fn serve_until<F>(
    listener: tokio::net::TcpListener,
    app: axum::Router,
    signal: F,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Exam Prep Notification Service");

    // Initialize database
    let pool = init::init_db(&config).await?;

    // Initialize services
    let push = Arc::new(PushHub::new());
    let services = init::build_services(&pool, push.clone(), &config)?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        push: push.clone(),
        reminders: services.reminders,
        notifications: services.notifications,
        scheduler: services.scheduler.clone(),
    });

    if config.scheduler.enabled {
        services.scheduler.start().await?;
    } else {
        tracing::warn!("Scheduler disabled via SCHEDULER_ENABLED; no reminders or reports will be sent");
    }

    let frontend_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    // Build router
    let app = routes::app(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    serve_until(listener, app, shutdown_signal()).await?;

    tracing::info!("Server stopped accepting connections, cleaning up");

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    tracing::info!(
        "Waiting up to {}s for in-flight scheduler runs",
        grace.as_secs()
    );
    app_state.scheduler.shutdown(grace).await;
    push.shutdown_all().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
