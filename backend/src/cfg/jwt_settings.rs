use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JwtSettings {
    /// Shared HMAC secret; when empty a persisted `.jwt_secret` file is used
    #[serde(default)]
    pub secret: String,

    #[serde(default)]
    pub issuer: String,

    #[serde(default)]
    pub access_token_expiry: i64, // In seconds (e.g., 15 minutes = 900)

    #[serde(default)]
    pub refresh_token_expiry: i64, // In seconds (e.g., 7 days = 604800)

    /// Interval of the background sweep removing expired and revoked refresh tokens, 0 disables it
    #[serde(default)]
    pub cleanup_interval: u64, // In seconds
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "portal-data-backend".to_string(),
            access_token_expiry: 15 * 60,           // 15 minutes
            refresh_token_expiry: 7 * 24 * 60 * 60, // 7 days
            cleanup_interval: 60 * 60,              // 1 hour
        }
    }
}
