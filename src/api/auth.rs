use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::error::ApiError;
use super::validation::validate_email;
use crate::crypto::{generate_token, hash_token, verify_password};
use crate::db::{format_timestamp, now_timestamp, LoginRequest, LoginResponse, User, UserResponse};
use crate::AppState;

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_email(&request.email).map_err(|e| ApiError::validation_field("email", e))?;
    let email = request.email.trim().to_lowercase();

    let mut conn = state.db.acquire().await?;
    let user = User::find_by_email(&mut conn, &email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::warn!(email = %email, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = generate_token();
    let now = Utc::now();
    let expires_at = format_timestamp(now + Duration::days(state.config.auth.session_days));

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(hash_token(&token))
    .bind(&expires_at)
    .bind(format_timestamp(now))
    .execute(&mut *conn)
    .await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Revoke the session used for this request
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    user: User,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = extract_token(&headers) {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ? AND user_id = ?")
            .bind(hash_token(&token))
            .bind(&user.id)
            .execute(&state.db)
            .await?;
    }
    tracing::info!(user_id = %user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Current user
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve a session token to its user. Expired sessions do not match.
pub async fn get_current_user(pool: &sqlx::SqlitePool, token: &str) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as(
        r#"
        SELECT u.* FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(hash_token(token))
    .bind(now_timestamp())
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
}

/// Delete sessions past their expiry
pub async fn purge_expired_sessions(pool: &sqlx::SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now_timestamp())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Extractor for the authenticated member
#[async_trait]
impl<S> FromRequestParts<S> for User
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        get_current_user(&state.db, &token).await
    }
}

/// Extractor that additionally requires the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = User::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin role required"));
        }
        Ok(AdminUser(user))
    }
}
