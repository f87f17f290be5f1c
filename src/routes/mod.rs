use std::sync::Arc;

use axum::{routing::get, Router};

use crate::middleware;
use crate::AppState;

pub mod admin;
pub mod auth;
pub mod health;
pub mod notifications;
pub mod study_reminders;
pub mod ws;

/// Application routes with shared state and the security-header middleware.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Live push channel
        .route("/ws", get(ws::ws_handler))
        .nest("/api/study-reminders", study_reminders::router())
        .nest("/api/notifications", notifications::router())
        .nest("/api/admin", admin::router())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::testing::{insert_user, test_pool};
    use crate::services::auth::AuthService;
    use crate::services::init::build_services;
    use crate::services::push::PushHub;
    use axum::body::Body;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    async fn test_app() -> (Router, SqlitePool) {
        let pool = test_pool().await;
        let mut config = Config::default();
        config.jwt.secret = SECRET.to_string();

        let push = Arc::new(PushHub::new());
        let services = build_services(&pool, push.clone(), &config).unwrap();
        let state = Arc::new(AppState {
            db: pool.clone(),
            config,
            push,
            reminders: services.reminders,
            notifications: services.notifications,
            scheduler: services.scheduler,
        });
        (app(state), pool)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header(
                http::header::AUTHORIZATION,
                format!("Bearer {}", AuthService::create_jwt(SECRET, id)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_scheduler_state() {
        let (app, _) = test_app().await;
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["scheduler_running"], false);
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let (app, _) = test_app().await;
        let (status, body) = call(&app, Method::GET, "/api/notifications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) =
            call(&app, Method::GET, "/api/notifications", Some("unknown-user"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn study_reminder_lifecycle() {
        let (app, pool) = test_app().await;
        let user = insert_user(&pool, "USER").await;

        let (status, _) = call(&app, Method::GET, "/api/study-reminders", Some(&user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = json!({
            "reminderTime": "19:30",
            "daysOfWeek": ["Monday", "Wednesday"],
            "studyGoalMinutes": 45,
            "timezone": "Africa/Addis_Ababa"
        });
        let (status, created) = call(
            &app,
            Method::POST,
            "/api/study-reminders",
            Some(&user),
            Some(request.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["reminder_time"], "19:30");
        assert_eq!(created["days_of_week"], json!(["Monday", "Wednesday"]));
        assert!(created["next_scheduled_at"].is_string());

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/study-reminders",
            Some(&user),
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let id = created["id"].as_str().unwrap().to_string();
        let (status, updated) = call(
            &app,
            Method::PUT,
            &format!("/api/study-reminders/{id}"),
            Some(&user),
            Some(json!({ "studyGoalMinutes": 60 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["study_goal_minutes"], 60);

        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/study-reminders/{id}"),
            Some(&user),
            Some(json!({ "reminderTime": "7pm" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/api/study-reminders/{id}"),
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, Method::GET, "/api/study-reminders", Some(&user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn announcements_are_admin_only_and_hidden_until_due() {
        let (app, pool) = test_app().await;
        let admin = insert_user(&pool, "ADMIN").await;
        let student = insert_user(&pool, "USER").await;

        let now_body = json!({ "title": "Maintenance", "message": "Back at 10:00" });
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/admin/announcements",
            Some(&student),
            Some(now_body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/admin/announcements",
            Some(&admin),
            Some(now_body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], 2);

        let later = (chrono::Utc::now() + chrono::Duration::days(2)).to_rfc3339();
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/admin/announcements",
            Some(&admin),
            Some(json!({ "title": "Exam day", "message": "Soon", "scheduledFor": later })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, list) =
            call(&app, Method::GET, "/api/notifications", Some(&student), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);
        assert_eq!(list["items"][0]["title"], "Maintenance");
        assert_eq!(list["items"][0]["category"], "SYSTEM");

        let (_, count) = call(
            &app,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&student),
            None,
        )
        .await;
        assert_eq!(count["count"], 1);

        let id = list["items"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            Method::PUT,
            &format!("/api/notifications/{id}/read"),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, read) = call(
            &app,
            Method::PUT,
            &format!("/api/notifications/{id}/read"),
            Some(&student),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["is_read"], true);

        let (_, list) = call(
            &app,
            Method::GET,
            "/api/notifications?unread_only=true",
            Some(&student),
            None,
        )
        .await;
        assert_eq!(list["total"], 0);

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/notifications?category=bogus",
            Some(&student),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn preferences_validate_quiet_hours() {
        let (app, pool) = test_app().await;
        let user = insert_user(&pool, "USER").await;

        let (status, prefs) = call(
            &app,
            Method::GET,
            "/api/notifications/preferences",
            Some(&user),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prefs["weekly_reports"], true);

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/notifications/preferences",
            Some(&user),
            Some(json!({ "quietHoursStart": "10pm" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, prefs) = call(
            &app,
            Method::PUT,
            "/api/notifications/preferences",
            Some(&user),
            Some(json!({ "quietHoursEnabled": true, "quietHoursStart": "21:30", "weeklyReports": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prefs["quiet_hours_enabled"], true);
        assert_eq!(prefs["quiet_hours_start"], "21:30");
        assert_eq!(prefs["weekly_reports"], false);
        assert_eq!(prefs["language"], "en");

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/notifications/preferences",
            Some(&user),
            Some(json!({ "language": "fr" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, prefs) = call(
            &app,
            Method::PUT,
            "/api/notifications/preferences",
            Some(&user),
            Some(json!({ "language": "AM-et" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prefs["language"], "am");
        assert_eq!(prefs["quiet_hours_start"], "21:30");
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers()["x-content-type-options"],
            "nosniff"
        );
        assert!(response.headers().contains_key("content-security-policy"));
    }
}
