use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqliteExecutor};
use uuid::Uuid;

use crate::core::{DbError, affected};

/// Server-side record of an issued token pair. Only digests of the token strings are kept.
#[derive(Clone, Debug, FromRow, Serialize)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// A record is honored while it is not revoked and not yet expired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

#[derive(Debug)]
pub struct NewRefreshToken<'a> {
    pub user_id: &'a str,
    pub access_token: &'a str,
    pub refresh_token: &'a str,
    pub expires_at: DateTime<Utc>,
}

/// SHA-256 hex digest used as the lookup key for token strings.
#[must_use]
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub async fn create_refresh_token<'e, E>(db: E, new_token: &NewRefreshToken<'_>) -> Result<RefreshToken, DbError>
where
    E: SqliteExecutor<'e>,
{
    let token = sqlx::query_as::<_, RefreshToken>(
        r"
        INSERT INTO refresh_tokens (id, user_id, access_token_hash, refresh_token_hash, expires_at, revoked, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        RETURNING id, user_id, access_token_hash, refresh_token_hash, expires_at, revoked, created_at
        ",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(new_token.user_id)
    .bind(token_digest(new_token.access_token))
    .bind(token_digest(new_token.refresh_token))
    .bind(new_token.expires_at)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(token)
}

pub async fn find_refresh_token_by_refresh<'e, E>(db: E, refresh_token: &str) -> Result<RefreshToken, DbError>
where
    E: SqliteExecutor<'e>,
{
    let token = sqlx::query_as::<_, RefreshToken>(
        r"
        SELECT id, user_id, access_token_hash, refresh_token_hash, expires_at, revoked, created_at
        FROM refresh_tokens
        WHERE refresh_token_hash = ?
        ORDER BY created_at DESC
        LIMIT 1
        ",
    )
    .bind(token_digest(refresh_token))
    .fetch_optional(db)
    .await?;
    token.ok_or(DbError::RowNotFound)
}

/// Newest record issued alongside the given access token.
pub async fn find_refresh_token_by_access<'e, E>(db: E, access_token: &str) -> Result<RefreshToken, DbError>
where
    E: SqliteExecutor<'e>,
{
    let token = sqlx::query_as::<_, RefreshToken>(
        r"
        SELECT id, user_id, access_token_hash, refresh_token_hash, expires_at, revoked, created_at
        FROM refresh_tokens
        WHERE access_token_hash = ?
        ORDER BY created_at DESC
        LIMIT 1
        ",
    )
    .bind(token_digest(access_token))
    .fetch_optional(db)
    .await?;
    token.ok_or(DbError::RowNotFound)
}

pub async fn revoke_refresh_token<'e, E>(db: E, id: &str) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    affected(result.rows_affected())
}

/// Compare-and-swap revoke: true only for the caller that flipped the flag.
pub async fn revoke_refresh_token_if_active<'e, E>(db: E, id: &str) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn revoke_all_refresh_tokens_for_user<'e, E>(db: E, user_id: &str) -> Result<u64, DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes every expired or revoked record, returning how many went away.
pub async fn cleanup_expired_refresh_tokens<'e, E>(db: E) -> Result<u64, DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ? OR revoked = 1")
        .bind(Utc::now())
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_token_digest_is_stable_hex() {
        let digest = token_digest("abc");
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_ne!(token_digest("abd"), digest);
    }

    #[test]
    fn test_validity_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        let mut token = RefreshToken {
            id: "t".into(),
            user_id: "u".into(),
            access_token_hash: String::new(),
            refresh_token_hash: String::new(),
            expires_at: now + Duration::seconds(10),
            revoked: false,
            created_at: now,
        };
        assert!(token.is_valid(now));

        token.revoked = true;
        assert!(!token.is_valid(now));

        token.revoked = false;
        token.expires_at = now;
        assert!(!token.is_valid(now));
    }
}
