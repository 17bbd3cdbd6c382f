use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::auth::{self, Claims, JwtError, PasswordError, TokenPair};
use crate::core::{Context, DbError};
use crate::db::{self, NewRefreshToken, NewUser, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User account is disabled")]
    UserDisabled,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("User not found")]
    UserNotFound,

    #[error("Token error: {0}")]
    Jwt(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Public projection of the authenticated user.
#[derive(Clone, Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            organization_id: user.organization_id,
            role_id: user.role_id,
            name: user.name,
            username: user.username,
            email: user.email,
            thumbnail: user.thumbnail,
        }
    }
}

/// Body of login, register and refresh responses.
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub user: UserSummary,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Default)]
pub struct Registration {
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub employee_id: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Issues a pair for the user and records it in the token store.
async fn open_session(context: &Context, user: User) -> Result<AuthSession, AuthError> {
    let tokens = context
        .jwt
        .issue_pair(&user.id, &user.organization_id, &user.role_id, &user.email)?;
    db::create_refresh_token(
        &context.db,
        &NewRefreshToken {
            user_id: &user.id,
            access_token: &tokens.access_token,
            refresh_token: &tokens.refresh_token,
            expires_at: tokens.refresh_expires_at,
        },
    )
    .await?;

    Ok(AuthSession {
        user: user.into(),
        tokens,
    })
}

pub async fn login(context: &Context, email: &str, password: &str) -> Result<AuthSession, AuthError> {
    let user = match db::get_user_by_email(&context.db, email).await {
        Ok(user) => user,
        Err(DbError::RowNotFound) => return Err(AuthError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !auth::spawn_verify_password(password.to_string(), user.password_hash.clone()).await? {
        tracing::warn!(user_id = %user.id, "Invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    if !user.is_active() {
        tracing::warn!(user_id = %user.id, status = %user.status, "Login refused for inactive user");
        return Err(AuthError::UserDisabled);
    }

    tracing::info!(user_id = %user.id, "User logged in");
    open_session(context, user).await
}

pub async fn register(context: &Context, registration: Registration) -> Result<AuthSession, AuthError> {
    if db::email_taken(&context.db, &registration.email, None).await? {
        return Err(AuthError::EmailTaken);
    }
    if db::username_taken(&context.db, &registration.username, None).await? {
        return Err(AuthError::UsernameTaken);
    }

    let password_hash = auth::spawn_hash_password(registration.password).await?;
    let new_user = NewUser {
        organization_id: registration.organization_id,
        role_id: registration.role_id,
        name: registration.name,
        username: registration.username,
        email: registration.email,
        password_hash,
        employee_id: registration.employee_id,
        position: registration.position,
        address: registration.address,
        phone: registration.phone,
    };

    // the partial unique indexes catch a concurrent registration that passed the checks above
    let user = db::create_user(&context.db, &new_user).await.map_err(|e| match e {
        e if e.violates("users.email") => AuthError::EmailTaken,
        e if e.violates("users.username") => AuthError::UsernameTaken,
        e => AuthError::Database(e),
    })?;

    tracing::info!(user_id = %user.id, "User registered");
    open_session(context, user).await
}

/// Revokes the session the refresh token belongs to; the access token must be its sibling.
pub async fn logout(context: &Context, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
    let record = find_record(context, refresh_token).await?;
    if record.access_token_hash != db::token_digest(access_token) {
        return Err(AuthError::InvalidToken);
    }

    db::revoke_refresh_token(&context.db, &record.id).await?;
    tracing::info!(user_id = %record.user_id, "User logged out");
    Ok(())
}

/// Single-use rotation: the old record is revoked and the new one inserted in one transaction.
pub async fn refresh(context: &Context, refresh_token: &str) -> Result<AuthSession, AuthError> {
    let record = find_record(context, refresh_token).await?;
    if !record.is_valid(Utc::now()) {
        return Err(AuthError::TokenExpired);
    }
    context.jwt.verify(refresh_token).map_err(token_failure)?;

    let user = match db::get_user_by_id(&context.db, &record.user_id).await {
        Ok(user) => user,
        Err(DbError::RowNotFound) => return Err(AuthError::InvalidToken),
        Err(e) => return Err(e.into()),
    };
    if !user.is_active() {
        return Err(AuthError::UserDisabled);
    }

    let tokens = context
        .jwt
        .issue_pair(&user.id, &user.organization_id, &user.role_id, &user.email)?;

    let mut tx = context.db.begin().await.map_err(DbError::from)?;
    if !db::revoke_refresh_token_if_active(&mut *tx, &record.id).await? {
        // another request rotated this token first
        return Err(AuthError::TokenExpired);
    }
    db::create_refresh_token(
        &mut *tx,
        &NewRefreshToken {
            user_id: &user.id,
            access_token: &tokens.access_token,
            refresh_token: &tokens.refresh_token,
            expires_at: tokens.refresh_expires_at,
        },
    )
    .await?;
    tx.commit().await.map_err(DbError::from)?;

    tracing::info!(user_id = %user.id, "Refresh token rotated");
    Ok(AuthSession {
        user: user.into(),
        tokens,
    })
}

pub async fn revoke_all(context: &Context, user_id: &str) -> Result<u64, AuthError> {
    let revoked = db::revoke_all_refresh_tokens_for_user(&context.db, user_id).await?;
    tracing::info!(user_id = %user_id, revoked, "Revoked all refresh tokens");
    Ok(revoked)
}

/// Verifies an access token and refuses it when its stored session is no longer valid.
/// A token without a stored record is accepted.
pub async fn validate(context: &Context, access_token: &str) -> Result<Claims, AuthError> {
    let claims = context.jwt.verify(access_token).map_err(token_failure)?;

    match db::find_refresh_token_by_access(&context.db, access_token).await {
        Ok(record) if !record.is_valid(Utc::now()) => Err(AuthError::TokenRevoked),
        Ok(_) | Err(DbError::RowNotFound) => Ok(claims),
        Err(e) => Err(e.into()),
    }
}

pub async fn current_user(context: &Context, user_id: &str) -> Result<User, AuthError> {
    match db::get_user_by_id(&context.db, user_id).await {
        Ok(user) => Ok(user),
        Err(DbError::RowNotFound) => Err(AuthError::UserNotFound),
        Err(e) => Err(e.into()),
    }
}

fn token_failure(e: JwtError) -> AuthError {
    match e {
        JwtError::TokenExpired => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    }
}

async fn find_record(context: &Context, refresh_token: &str) -> Result<db::RefreshToken, AuthError> {
    match db::find_refresh_token_by_refresh(&context.db, refresh_token).await {
        Ok(record) => Ok(record),
        Err(DbError::RowNotFound) => Err(AuthError::InvalidToken),
        Err(e) => Err(e.into()),
    }
}

/// Background sweep removing expired and revoked records.
pub async fn cleanup_tokens(context: &Context) -> Result<u64, AuthError> {
    let removed = db::cleanup_expired_refresh_tokens(&context.db).await?;
    tracing::info!(removed, "Cleaned up refresh tokens");
    Ok(removed)
}
