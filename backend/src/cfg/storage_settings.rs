use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Directory receiving uploaded files
    #[serde(default)]
    pub root: String,

    #[serde(default)]
    pub max_upload_size: usize, // In bytes
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: "uploads".to_string(),
            max_upload_size: 32 << 20,
        }
    }
}
