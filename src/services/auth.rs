use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{User, UserRepository};
use crate::error::{AppError, AppResult};

/// Claims of the access tokens issued by the main application.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(secret: &str, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve a bearer token to an active user.
    pub async fn get_user_from_token(pool: &SqlitePool, secret: &str, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(secret, token)?;
        let user = UserRepository::find_by_id(pool, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            tracing::debug!("Rejecting token for inactive user {}", user.id);
            return Err(AppError::Unauthorized);
        }
        Ok(user)
    }

    #[cfg(test)]
    pub fn create_jwt(secret: &str, user_id: &str) -> String {
        use chrono::{Duration, Utc};
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }
}
