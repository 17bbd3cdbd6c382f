use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, SettingFields, SettingFilter};

#[derive(Debug, Default, Deserialize)]
pub struct SettingListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub category: Option<String>,
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KeysQuery {
    pub keys: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingRequest {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: String,
    pub user_id: Option<String>,
    pub is_public: bool,
}

impl SettingRequest {
    fn into_fields(self) -> Result<SettingFields, ApiError> {
        let kind = non_blank(self.kind).unwrap_or_else(|| "string".to_string());
        Validator::new()
            .required("key", &self.key)
            .max_len("key", self.key.trim(), 255)
            .required("category", &self.category)
            .one_of("type", &kind, db::SETTING_TYPES)
            .finish()?;
        Ok(SettingFields {
            key: self.key.trim().to_string(),
            value: self.value,
            kind,
            category: self.category.trim().to_string(),
            user_id: non_blank(self.user_id),
            is_public: self.is_public,
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    match e {
        e if e.violates("settings.key") => ApiError::Conflict("Setting key already exists".to_string()),
        e => ApiError::from_db(e, "Setting"),
    }
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<SettingListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = SettingFilter {
        category: query.category.as_deref(),
        user_id: query.user_id.as_deref(),
        kind: query.kind.as_deref(),
        search: query.list.search(),
    };
    let page = db::list_settings(
        &context.db,
        &filter,
        query.list.sort(db::SETTING_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Settings retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let setting = db::get_setting(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Setting retrieved successfully", setting))
}

pub async fn get_by_key(
    State(context): State<core::ArcContext>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let setting = db::get_setting_by_key(&context.db, &key).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Setting retrieved successfully", setting))
}

pub async fn list_by_category(
    State(context): State<core::ArcContext>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = db::list_settings_by_category(&context.db, &category)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Settings retrieved successfully", settings))
}

/// `?keys=a,b` answers `{a: value, b: value}` for the keys that exist.
pub async fn get_values(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<KeysQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let keys: Vec<String> = query
        .keys
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect();
    Validator::new().non_empty_list("keys", &keys).finish()?;
    let values = db::get_setting_values(&context.db, &keys).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Settings retrieved successfully", values))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    JsonBody(request): JsonBody<SettingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let setting = db::create_setting(&context.db, &fields).await.map_err(handle_error)?;
    Ok(ApiResponse::created("Setting created successfully", setting))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<SettingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let setting = db::update_setting(&context.db, &id, &fields).await.map_err(handle_error)?;
    Ok(ApiResponse::updated("Setting updated successfully", setting))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_setting(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Setting deleted successfully"))
}
