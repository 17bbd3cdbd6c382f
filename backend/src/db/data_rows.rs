use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, SqliteExecutor};
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, SqlValue, affected,
    fetch_page, live_rows,
};

pub const DATA_ROW_SORT_COLUMNS: &[&str] = &["row_index", "created_at"];

/// Data rows are listed in bigger pages than other resources.
pub const DATA_ROW_MAX_LIMIT: i64 = 1000;

const DATA_ROW_COLUMNS: &str = "id, dataset_id, row_index, data, created_by, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct DataRow {
    pub id: String,
    pub dataset_id: String,
    pub row_index: i64,
    pub data: Json<serde_json::Value>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct DataRowStats {
    pub dataset_id: String,
    pub total_rows: i64,
    pub max_row_index: Option<i64>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

pub async fn list_data_rows(
    db: &DbContext,
    dataset_id: &str,
    search: Option<&str>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<DataRow>, DbError> {
    let mut filter = SqlFilter::new();
    filter
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .with("dataset_id = ?", [SqlValue::from(dataset_id)])
        .search(&["data"], search);

    let statement = ListStatement {
        select: DATA_ROW_COLUMNS,
        ..ListStatement::table("data_rows")
    };
    fetch_page(db, statement, &filter, sort, page).await
}

pub async fn get_data_row(db: &DbContext, id: &str) -> Result<DataRow, DbError> {
    let sql = format!(
        "SELECT {DATA_ROW_COLUMNS} FROM data_rows WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, DataRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

async fn next_row_index<'e, E>(db: E, dataset_id: &str) -> Result<i64, DbError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT COALESCE(MAX(row_index) + 1, 0) FROM data_rows WHERE dataset_id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let next: i64 = sqlx::query_scalar(&sql).bind(dataset_id).fetch_one(db).await?;
    Ok(next)
}

async fn insert_data_row<'e, E>(
    db: E,
    dataset_id: &str,
    row_index: i64,
    data: &serde_json::Value,
    created_by: &str,
) -> Result<DataRow, DbError>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO data_rows (id, dataset_id, row_index, data, created_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {DATA_ROW_COLUMNS}"
    );
    let row = sqlx::query_as::<_, DataRow>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(dataset_id)
        .bind(row_index)
        .bind(Json(data))
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(row)
}

/// Appends one row; without an explicit index it goes after the current last row.
pub async fn create_data_row(
    db: &DbContext,
    dataset_id: &str,
    row_index: Option<i64>,
    data: &serde_json::Value,
    created_by: &str,
) -> Result<DataRow, DbError> {
    let mut tx = db.begin().await?;
    let row_index = match row_index {
        Some(index) => index,
        None => next_row_index(&mut *tx, dataset_id).await?,
    };
    let row = insert_data_row(&mut *tx, dataset_id, row_index, data, created_by).await?;
    tx.commit().await?;
    Ok(row)
}

/// Appends all rows with consecutive indexes in one transaction.
pub async fn create_data_rows_bulk(
    db: &DbContext,
    dataset_id: &str,
    rows: &[serde_json::Value],
    created_by: &str,
) -> Result<Vec<DataRow>, DbError> {
    let mut tx = db.begin().await?;
    let first = next_row_index(&mut *tx, dataset_id).await?;
    let mut created = Vec::with_capacity(rows.len());
    for (offset, data) in (0_i64..).zip(rows) {
        created.push(insert_data_row(&mut *tx, dataset_id, first + offset, data, created_by).await?);
    }
    tx.commit().await?;
    Ok(created)
}

pub async fn update_data_row(
    db: &DbContext,
    id: &str,
    row_index: Option<i64>,
    data: &serde_json::Value,
) -> Result<DataRow, DbError> {
    let sql = format!(
        "UPDATE data_rows SET row_index = COALESCE(?, row_index), data = ?, updated_at = ? \
         WHERE id = ? AND {} RETURNING {DATA_ROW_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, DataRow>(&sql)
        .bind(row_index)
        .bind(Json(data))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_data_row(db: &DbContext, id: &str) -> Result<(), DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE data_rows SET deleted_at = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(now).bind(now).bind(id).execute(db).await?;
    affected(result.rows_affected())
}

/// Soft deletes every row of a dataset; returns how many were removed.
pub async fn delete_dataset_rows(db: &DbContext, dataset_id: &str) -> Result<u64, DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE data_rows SET deleted_at = ?, updated_at = ? WHERE dataset_id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql)
        .bind(now)
        .bind(now)
        .bind(dataset_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

pub async fn data_row_stats(db: &DbContext, dataset_id: &str) -> Result<DataRowStats, DbError> {
    let sql = format!(
        "SELECT ? AS dataset_id, COUNT(*) AS total_rows, MAX(row_index) AS max_row_index, \
         MAX(updated_at) AS last_updated_at FROM data_rows WHERE dataset_id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let stats = sqlx::query_as::<_, DataRowStats>(&sql)
        .bind(dataset_id)
        .bind(dataset_id)
        .fetch_one(db)
        .await?;
    Ok(stats)
}
