use std::future::Future;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage operation failed")]
    OperationFailed { #[from] source: std::io::Error },
}

/// Object storage for uploaded file bytes, addressed by relative keys.
pub trait FileStorage {
    /// Stores `bytes` under `key`, returning the number of bytes written.
    fn put(&self, key: &str, bytes: &[u8]) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Removes the object; a missing object is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Stores objects as plain files below a root directory.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key below the root, refusing absolute paths and parent traversal.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let only_normal = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !only_normal {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl FileStorage for LocalStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<u64, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        tracing::debug!(key = %key, size = bytes.len(), "stored object");
        Ok(bytes.len() as u64)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(key = %key, "object already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds the storage key for an upload: `<folder>/<id>-<sanitized file name>`.
#[must_use]
pub fn object_key(folder: &str, id: &str, file_name: &str) -> String {
    let clean: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let clean = clean.trim_start_matches('.');
    let clean = if clean.is_empty() { "upload" } else { clean };
    format!("{folder}/{id}-{clean}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_traversal() {
        let storage = LocalStorage::new("uploads");
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert_eq!(storage.resolve("a/b.csv").unwrap(), Path::new("uploads/a/b.csv"));
    }

    #[test]
    fn test_object_key_sanitizes_file_names() {
        assert_eq!(object_key("misc", "id1", "report 2024.csv"), "misc/id1-report_2024.csv");
        assert_eq!(object_key("misc", "id1", "../../x"), "misc/id1-_.._x");
        assert_eq!(object_key("misc", "id1", ""), "misc/id1-upload");
    }

    #[tokio::test]
    async fn test_put_and_remove_round_trip() {
        let root = std::env::temp_dir().join(format!("portal-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(&root);

        let written = storage.put("d1/f.txt", b"hello").await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(tokio::fs::read(root.join("d1/f.txt")).await.unwrap(), b"hello");

        storage.remove("d1/f.txt").await.unwrap();
        assert!(!root.join("d1/f.txt").exists());
        storage.remove("d1/f.txt").await.unwrap();

        tokio::fs::remove_dir_all(&root).await.ok();
    }
}
