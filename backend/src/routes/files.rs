use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db;
use crate::services::files::{self as usecase, FileError, Upload};

#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub dataset_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileUpdateRequest {
    pub name: String,
    pub dataset_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileStatusRequest {
    pub status: String,
}

fn handle_error(e: FileError) -> ApiError {
    match e {
        FileError::NotFound => ApiError::NotFound(e.to_string()),
        FileError::MissingFile | FileError::EmptyFile => ApiError::BadRequest(e.to_string()),
        FileError::Database(DbError::ForeignKeyViolation(_)) => {
            ApiError::BadRequest("Referenced record does not exist".to_string())
        }
        FileError::Storage(_) | FileError::Database(_) => ApiError::internal(e),
    }
}

fn handle_db_error(e: DbError) -> ApiError {
    handle_error(e.into())
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::debug!(error = %e, "Rejected multipart body");
    ApiError::BadRequest("Invalid multipart body".to_string())
}

/// Collects the `file` part and the optional `name` and `dataset_id` text parts.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.content_type = field.content_type().map(str::to_string);
                upload.bytes = field.bytes().await.map_err(multipart_error)?;
            }
            Some("name") => upload.name = non_blank(Some(field.text().await.map_err(multipart_error)?)),
            Some("dataset_id") => upload.dataset_id = non_blank(Some(field.text().await.map_err(multipart_error)?)),
            _ => {}
        }
    }
    Ok(upload)
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<FileListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = db::list_files(
        &context.db,
        query.dataset_id.as_deref(),
        query.status.as_deref(),
        query.list.search(),
        query.list.sort(db::FILE_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_db_error)?;
    Ok(ApiResponse::page("Files retrieved successfully", page))
}

pub async fn list_by_dataset(
    State(context): State<core::ArcContext>,
    Path(dataset_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = db::list_files(
        &context.db,
        Some(&dataset_id),
        None,
        query.search(),
        query.sort(db::FILE_SORT_COLUMNS),
        query.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_db_error)?;
    Ok(ApiResponse::page("Files retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file = db::get_file(&context.db, &id).await.map_err(handle_db_error)?;
    Ok(ApiResponse::ok("File retrieved successfully", file))
}

pub async fn upload(
    State(context): State<core::ArcContext>,
    identity: Identity,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(multipart).await?;
    let file = usecase::upload(&context, &identity, upload).await.map_err(handle_error)?;
    Ok(ApiResponse::created("File uploaded successfully", file))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<FileUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new().required("name", &request.name).finish()?;
    let dataset_id = non_blank(request.dataset_id);
    let file = db::update_file(&context.db, &id, request.name.trim(), dataset_id.as_deref())
        .await
        .map_err(handle_db_error)?;
    Ok(ApiResponse::updated("File updated successfully", file))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<FileStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = request.status.trim();
    Validator::new().one_of("status", status, db::FILE_STATUSES).finish()?;
    db::update_file_status(&context.db, &id, status)
        .await
        .map_err(handle_db_error)?;
    let file = db::get_file(&context.db, &id).await.map_err(handle_db_error)?;
    Ok(ApiResponse::updated("File status updated successfully", file))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    usecase::remove(&context, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("File deleted successfully"))
}
