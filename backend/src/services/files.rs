use std::path::Path;

use axum::body::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::core::{Context, DbError};
use crate::db::{self, NewStoredFile, StoredFile};
use crate::services::storage::{FileStorage, StorageError, object_key};

const UPLOAD_FOLDER: &str = "files";
const STORAGE_TYPE_LOCAL: &str = "local";

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found")]
    NotFound,

    #[error("File is required")]
    MissingFile,

    #[error("File is empty")]
    EmptyFile,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for FileError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::RowNotFound => Self::NotFound,
            e => Self::Database(e),
        }
    }
}

/// One file received from a multipart form.
#[derive(Debug, Default)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub name: Option<String>,
    pub dataset_id: Option<String>,
}

/// Writes the bytes to storage, then records the file; the bytes are removed again if the record fails.
pub async fn upload(context: &Context, identity: &Identity, upload: Upload) -> Result<StoredFile, FileError> {
    if upload.file_name.trim().is_empty() {
        return Err(FileError::MissingFile);
    }
    if upload.bytes.is_empty() {
        return Err(FileError::EmptyFile);
    }

    let id = Uuid::new_v4().to_string();
    let original_name = upload.file_name.trim();
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime_type = upload
        .content_type
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| mime_guess::from_path(original_name).first_or_octet_stream().to_string());
    let name = upload.name.unwrap_or_else(|| original_name.to_string());

    let key = object_key(UPLOAD_FOLDER, &id, original_name);
    let size = context.storage.put(&key, &upload.bytes).await?;

    let new_file = NewStoredFile {
        id: &id,
        name: &name,
        original_name,
        extension: &extension,
        size: i64::try_from(size).unwrap_or(i64::MAX),
        mime_type: &mime_type,
        path: &key,
        storage_type: STORAGE_TYPE_LOCAL,
        dataset_id: upload.dataset_id.as_deref(),
        uploaded_by: &identity.user_id,
    };
    match db::create_file(&context.db, &new_file).await {
        Ok(stored) => {
            tracing::info!(file_id = %stored.id, size = stored.size, "File uploaded");
            Ok(stored)
        }
        Err(e) => {
            if let Err(cleanup) = context.storage.remove(&key).await {
                tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned upload");
            }
            Err(e.into())
        }
    }
}

/// Removes the stored bytes and marks the record deleted.
pub async fn remove(context: &Context, id: &str) -> Result<(), FileError> {
    let file = db::get_file(&context.db, id).await?;
    context.storage.remove(&file.path).await?;
    db::mark_file_deleted(&context.db, id).await?;
    tracing::info!(file_id = %id, "File deleted");
    Ok(())
}
