use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, affected, fetch_page,
    live_rows,
};

pub const FILE_SORT_COLUMNS: &[&str] = &["name", "size", "created_at"];
pub const FILE_STATUSES: &[&str] = &["ready", "processing", "failed"];

const FILE_COLUMNS: &str = "id, name, original_name, extension, size, mime_type, path, storage_type, dataset_id, \
     uploaded_by, status, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub original_name: String,
    pub extension: String,
    pub size: i64,
    pub mime_type: String,
    pub path: String,
    pub storage_type: String,
    pub dataset_id: Option<String>,
    pub uploaded_by: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewStoredFile<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub original_name: &'a str,
    pub extension: &'a str,
    pub size: i64,
    pub mime_type: &'a str,
    pub path: &'a str,
    pub storage_type: &'a str,
    pub dataset_id: Option<&'a str>,
    pub uploaded_by: &'a str,
}

pub async fn list_files(
    db: &DbContext,
    dataset_id: Option<&str>,
    status: Option<&str>,
    search: Option<&str>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<StoredFile>, DbError> {
    let mut filter = SqlFilter::new();
    filter
        .raw(live_rows(SoftDelete::Status, ""))
        .eq("dataset_id", dataset_id)
        .eq("status", status)
        .search(&["name", "original_name"], search);

    let statement = ListStatement {
        select: FILE_COLUMNS,
        ..ListStatement::table("files")
    };
    fetch_page(db, statement, &filter, sort, page).await
}

pub async fn get_file(db: &DbContext, id: &str) -> Result<StoredFile, DbError> {
    let sql = format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND {}",
        live_rows(SoftDelete::Status, "")
    );
    sqlx::query_as::<_, StoredFile>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_file(db: &DbContext, file: &NewStoredFile<'_>) -> Result<StoredFile, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO files (id, name, original_name, extension, size, mime_type, path, storage_type, dataset_id, \
         uploaded_by, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'ready', ?, ?) RETURNING {FILE_COLUMNS}"
    );
    let stored = sqlx::query_as::<_, StoredFile>(&sql)
        .bind(file.id)
        .bind(file.name)
        .bind(file.original_name)
        .bind(file.extension)
        .bind(file.size)
        .bind(file.mime_type)
        .bind(file.path)
        .bind(file.storage_type)
        .bind(file.dataset_id)
        .bind(file.uploaded_by)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(stored)
}

/// Renames a file or moves it to another dataset; the stored bytes are untouched.
pub async fn update_file(db: &DbContext, id: &str, name: &str, dataset_id: Option<&str>) -> Result<StoredFile, DbError> {
    let sql = format!(
        "UPDATE files SET name = ?, dataset_id = ?, updated_at = ? WHERE id = ? AND {} RETURNING {FILE_COLUMNS}",
        live_rows(SoftDelete::Status, "")
    );
    sqlx::query_as::<_, StoredFile>(&sql)
        .bind(name)
        .bind(dataset_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn update_file_status(db: &DbContext, id: &str, status: &str) -> Result<(), DbError> {
    let sql = format!(
        "UPDATE files SET status = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::Status, "")
    );
    let result = sqlx::query(&sql)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    affected(result.rows_affected())
}

pub async fn mark_file_deleted(db: &DbContext, id: &str) -> Result<(), DbError> {
    update_file_status(db, id, "deleted").await
}
