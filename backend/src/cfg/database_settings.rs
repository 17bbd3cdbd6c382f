use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub max_connections: u32,

    /// Connections kept open while idle
    #[serde(default)]
    pub min_connections: u32,

    #[serde(default)]
    pub max_lifetime: u64, // In seconds
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:portal.sqlite".to_string(),
            max_connections: 25,
            min_connections: 5,
            max_lifetime: 5 * 60,
        }
    }
}
