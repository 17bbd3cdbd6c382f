use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, IntegrationFields, IntegrationFilter};

#[derive(Debug, Default, Deserialize)]
pub struct IntegrationListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub organization_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntegrationRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    pub config: serde_json::Value,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntegrationStatusRequest {
    pub status: String,
}

impl IntegrationRequest {
    fn into_fields(self) -> Result<IntegrationFields, ApiError> {
        Validator::new()
            .min_len("name", self.name.trim(), 2)
            .max_len("name", self.name.trim(), 255)
            .required("type", &self.kind)
            .finish()?;
        let config = if self.config.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.config
        };
        Ok(IntegrationFields {
            name: self.name.trim().to_string(),
            kind: self.kind.trim().to_string(),
            description: non_blank(self.description),
            config,
            endpoint: non_blank(self.endpoint),
            api_key: non_blank(self.api_key),
            organization_id: non_blank(self.organization_id),
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Integration")
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<IntegrationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = IntegrationFilter {
        organization_id: query.organization_id.as_deref(),
        kind: query.kind.as_deref(),
        status: query.status.as_deref(),
        search: query.list.search(),
    };
    let page = db::list_integrations(
        &context.db,
        &filter,
        query.list.sort(db::INTEGRATION_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Integrations retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let integration = db::get_integration(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Integration retrieved successfully", integration))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<IntegrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let integration = db::create_integration(&context.db, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    tracing::info!(integration_id = %integration.id, kind = %integration.kind, "Integration created");
    Ok(ApiResponse::created("Integration created successfully", integration))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<IntegrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let integration = db::update_integration(&context.db, &id, &fields)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Integration updated successfully", integration))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<IntegrationStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = request.status.trim();
    Validator::new().one_of("status", status, db::INTEGRATION_STATUSES).finish()?;
    let integration = db::update_integration_status(&context.db, &id, status)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Integration status updated successfully", integration))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_integration(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Integration deleted successfully"))
}
