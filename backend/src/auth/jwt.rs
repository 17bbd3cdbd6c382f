use std::fs;

use axum::http::HeaderMap;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken as jwt;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cfg;
use crate::core::ApiError;

type TryRngError = <rand::rngs::OsRng as rand::TryRngCore>::Error;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";
const BEARER_PREFIX: &str = "Bearer ";

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT token")]
    EncodingFailed(jwt::errors::Error),

    #[error("File system operation failed")]
    FileSystemOperationFailed { #[from] source: std::io::Error },

    #[error("Random number generation operation failed")]
    RngOperationFailed { source: TryRngError },

    #[error("User ID is required to issue tokens")]
    MissingUserId,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Authorization header required")]
    MissingAuthorizationHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthorizationHeader,
}

impl From<JwtError> for ApiError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::TokenExpired
            | JwtError::InvalidToken
            | JwtError::MissingAuthorizationHeader
            | JwtError::InvalidAuthorizationHeader => Self::Unauthorized(e.to_string()),
            JwtError::EncodingFailed(_)
            | JwtError::FileSystemOperationFailed { .. }
            | JwtError::RngOperationFailed { .. }
            | JwtError::MissingUserId => Self::internal(e),
        }
    }
}

impl IntoResponse for JwtError {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(
            error_type = %std::any::type_name::<Self>(),
            error_message = %self);
        ApiError::from(self).into_response()
    }
}

/// Signed claim bundle shared by access and refresh tokens; only `exp` and `jti` differ.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Claims {
    pub user_id: String,
    pub organization_id: String,
    pub role_id: String,
    pub email: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

/// Token bundle returned by login, register and refresh.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64, // Seconds until the access token expires
    pub token_type: String,
    #[serde(skip)]
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtContext {
    pub encoding_key: jwt::EncodingKey,
    pub decoding_key: jwt::DecodingKey,
    pub validation: jwt::Validation,
    pub issuer: String,
    pub access_token_expiry: i64,
    pub refresh_token_expiry: i64,
}

impl JwtContext {
    #[must_use]
    pub fn new(settings: &cfg::JwtSettings, secret: &str) -> Self {
        let encoding_key = jwt::EncodingKey::from_secret(secret.as_ref());
        let decoding_key = jwt::DecodingKey::from_secret(secret.as_ref());

        // only HS256 is accepted whatever the header declares
        let mut validation = jwt::Validation::new(jwt::Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: settings.issuer.clone(),
            access_token_expiry: settings.access_token_expiry,
            refresh_token_expiry: settings.refresh_token_expiry,
        }
    }

    /// Issues an access/refresh pair carrying the same identity claims.
    pub fn issue_pair(
        &self,
        user_id: &str,
        organization_id: &str,
        role_id: &str,
        email: &str,
    ) -> Result<TokenPair, JwtError> {
        if user_id.trim().is_empty() {
            return Err(JwtError::MissingUserId);
        }

        let now = Utc::now();
        let claims = |lifetime: i64| Claims {
            user_id: user_id.to_string(),
            organization_id: organization_id.to_string(),
            role_id: role_id.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: now.timestamp() + lifetime,
            jti: Uuid::new_v4().to_string(),
        };

        Ok(TokenPair {
            access_token: self.sign(&claims(self.access_token_expiry))?,
            refresh_token: self.sign(&claims(self.refresh_token_expiry))?,
            expires_in: self.access_token_expiry,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            refresh_expires_at: now + Duration::seconds(self.refresh_token_expiry),
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        let header = jwt::Header::new(jwt::Algorithm::HS256);
        jwt::encode(&header, claims, &self.encoding_key).map_err(JwtError::EncodingFailed)
    }

    /// Checks signature, algorithm, issuer, `nbf` and `exp`.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = jwt::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Verifies the bearer token of a request's `Authorization` header.
    pub fn verify_header(&self, headers: &HeaderMap) -> Result<Claims, JwtError> {
        self.verify(bearer_token(headers)?)
    }
}

/// Extracts the token following the literal `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, JwtError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(JwtError::MissingAuthorizationHeader)?
        .to_str()
        .map_err(|_| JwtError::InvalidAuthorizationHeader)?;

    value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(JwtError::InvalidAuthorizationHeader)
}

/// Uses the configured secret, otherwise loads or creates a persisted one
pub fn get_jwt_secret(settings: &cfg::JwtSettings) -> Result<String, JwtError> {
    if !settings.secret.trim().is_empty() {
        if settings.secret.len() < 32 {
            tracing::warn!("Configured JWT secret is shorter than 32 characters");
        }
        return Ok(settings.secret.clone());
    }

    // check persisted secret file
    let secret_file_path = cfg::AppSettings::get_config_path().join(".jwt_secret");
    if let Ok(file_secret) = fs::read_to_string(&secret_file_path) {
        let trimmed_secret = file_secret.trim();
        if trimmed_secret.len() >= 32 {
            return Ok(trimmed_secret.to_string());
        }
    }

    if let Some(parent) = secret_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let new_secret = generate_secure_secret()?;
    fs::write(&secret_file_path, &new_secret)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&secret_file_path)?.permissions();
        perms.set_mode(0o600); // rw-------
        fs::set_permissions(&secret_file_path, perms)?;
    }

    tracing::info!(path = %secret_file_path.to_string_lossy(), "Generated new JWT secret");
    Ok(new_secret)
}

/// Generates a cryptographically secure random secret
fn generate_secure_secret() -> Result<String, JwtError> {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| JwtError::RngOperationFailed { source: e })?;
    Ok(hex::encode(bytes))
}

/// Expiry is the only failure reported as such; everything else is an invalid token
impl From<jwt::errors::Error> for JwtError {
    fn from(e: jwt::errors::Error) -> Self {
        match e.kind() {
            jwt::errors::ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => {
                tracing::debug!(reason = %e, "token rejected");
                Self::InvalidToken
            }
        }
    }
}
