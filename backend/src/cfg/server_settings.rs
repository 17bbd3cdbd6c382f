use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSettings {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub log_directives: String,

    /// Service name reported in logs and used as the default token issuer
    #[serde(default)]
    pub name: String,

    /// Version reported by the health endpoint
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub request_timeout: u64, // In seconds

    #[serde(default)]
    pub shutdown_timeout: u64, // In seconds
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_directives: "info,tower_http=info,axum=info,sqlx=warn".to_string(),
            name: "portal-data-backend".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: 60,
            shutdown_timeout: 30,
        }
    }
}
