use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, QueryParams, Validator};
use crate::db;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DataRowRequest {
    pub row_index: Option<i64>,
    pub data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BulkDataRowRequest {
    pub rows: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Data row")
}

/// Rows hang off a live dataset; archived datasets still accept reads and writes.
async fn ensure_dataset(context: &core::Context, dataset_id: &str) -> Result<(), ApiError> {
    db::get_dataset_state(&context.db, dataset_id)
        .await
        .map(|_| ())
        .map_err(|e| ApiError::from_db(e, "Dataset"))
}

pub async fn list(
    State(context): State<core::ArcContext>,
    Path(dataset_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_dataset(&context, &dataset_id).await?;
    let page = db::list_data_rows(
        &context.db,
        &dataset_id,
        query.search(),
        query.sort(db::DATA_ROW_SORT_COLUMNS),
        query.page_request(db::DATA_ROW_MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Data rows retrieved successfully", page))
}

pub async fn stats(
    State(context): State<core::ArcContext>,
    Path(dataset_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_dataset(&context, &dataset_id).await?;
    let stats = db::data_row_stats(&context.db, &dataset_id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Data row statistics retrieved successfully", stats))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(dataset_id): Path<String>,
    JsonBody(request): JsonBody<DataRowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut validator = Validator::new();
    validator.json_object("data", &request.data);
    if let Some(row_index) = request.row_index {
        validator.range("row_index", row_index, 0, i64::MAX);
    }
    validator.finish()?;
    ensure_dataset(&context, &dataset_id).await?;
    let row = db::create_data_row(&context.db, &dataset_id, request.row_index, &request.data, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::created("Data row created successfully", row))
}

/// Appends every row or none of them.
pub async fn create_bulk(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(dataset_id): Path<String>,
    JsonBody(request): JsonBody<BulkDataRowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut validator = Validator::new();
    validator
        .non_empty_list("rows", &request.rows)
        .max_items("rows", &request.rows, usize::try_from(db::DATA_ROW_MAX_LIMIT).unwrap_or(usize::MAX));
    for (i, data) in request.rows.iter().enumerate() {
        validator.json_object(&format!("rows[{i}]"), data);
    }
    validator.finish()?;
    ensure_dataset(&context, &dataset_id).await?;
    let rows = db::create_data_rows_bulk(&context.db, &dataset_id, &request.rows, &identity.user_id)
        .await
        .map_err(handle_error)?;
    tracing::info!(dataset_id = %dataset_id, count = rows.len(), "Data rows appended");
    Ok(ApiResponse::created("Data rows created successfully", rows))
}

pub async fn delete_all(
    State(context): State<core::ArcContext>,
    Path(dataset_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_dataset(&context, &dataset_id).await?;
    let deleted = db::delete_dataset_rows(&context.db, &dataset_id).await.map_err(handle_error)?;
    tracing::info!(dataset_id = %dataset_id, deleted, "Data rows cleared");
    Ok(ApiResponse::ok("Data rows deleted successfully", DeletedCount { deleted }))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = db::get_data_row(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Data row retrieved successfully", row))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<DataRowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut validator = Validator::new();
    validator.json_object("data", &request.data);
    if let Some(row_index) = request.row_index {
        validator.range("row_index", row_index, 0, i64::MAX);
    }
    validator.finish()?;
    let row = db::update_data_row(&context.db, &id, request.row_index, &request.data)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Data row updated successfully", row))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_data_row(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Data row deleted successfully"))
}
