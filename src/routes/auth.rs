use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::db::User;
use crate::error::AppError;
use crate::services::auth::AuthService;
use crate::AppState;

// ============================================================================
// Auth Extractors
// ============================================================================

/// Extractor for authenticated user
pub struct AuthUser(pub User);

/// Authenticated user with the ADMIN role.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!("Missing or invalid Authorization header");
            AppError::Unauthorized
        })?;

    if auth_header.len() < 7 || !auth_header[..7].eq_ignore_ascii_case("bearer ") {
        tracing::debug!("Authorization header doesn't start with 'Bearer '");
        return Err(AppError::Unauthorized);
    }

    let token = auth_header[7..].trim();
    if token.is_empty() {
        tracing::debug!("Empty bearer token in Authorization header");
        return Err(AppError::Unauthorized);
    }
    Ok(token)
}

/// Resolve a raw token to its user, folding every failure into `Unauthorized`.
pub async fn user_from_token(state: &AppState, token: &str) -> Result<User, AppError> {
    AuthService::get_user_from_token(&state.db, &state.config.jwt.secret, token)
        .await
        .map_err(|e| {
            tracing::debug!("Failed to get user from token: {:?}", e);
            match e {
                AppError::Database(_) | AppError::Internal(_) => e,
                _ => AppError::Unauthorized,
            }
        })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = user_from_token(state, token).await?;

        tracing::debug!("Authenticated user: {}", user.id);
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::debug!("User {} is not an admin", user.id);
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
