use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, Visualization, VisualizationFields, VisualizationFilter};

#[derive(Debug, Default, Deserialize)]
pub struct VisualizationListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub topic_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub is_highlight: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VisualizationRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub config: serde_json::Value,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub topic_id: Option<String>,
    pub is_highlight: bool,
    pub status: Option<String>,
}

impl VisualizationRequest {
    fn into_fields(self) -> Result<VisualizationFields, ApiError> {
        let status = non_blank(self.status).unwrap_or_else(|| "draft".to_string());
        Validator::new()
            .min_len("title", self.title.trim(), 2)
            .max_len("title", self.title.trim(), 255)
            .required("type", &self.kind)
            .one_of("status", &status, db::VISUALIZATION_STATUSES)
            .finish()?;
        let config = if self.config.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.config
        };
        Ok(VisualizationFields {
            title: self.title.trim().to_string(),
            description: non_blank(self.description),
            kind: self.kind.trim().to_string(),
            config,
            dataset_id: non_blank(self.dataset_id),
            organization_id: non_blank(self.organization_id),
            topic_id: non_blank(self.topic_id),
            is_highlight: self.is_highlight,
            status,
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Visualization")
}

async fn list_with(
    context: &core::Context,
    filter: &VisualizationFilter<'_>,
    list: &ListQuery,
) -> Result<ApiResponse<Vec<Visualization>>, ApiError> {
    let page = db::list_visualizations(
        &context.db,
        filter,
        list.sort(db::VISUALIZATION_SORT_COLUMNS),
        list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Visualizations retrieved successfully", page))
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<VisualizationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = VisualizationFilter {
        dataset_id: query.dataset_id.as_deref(),
        organization_id: query.organization_id.as_deref(),
        topic_id: query.topic_id.as_deref(),
        kind: query.kind.as_deref(),
        status: query.status.as_deref(),
        is_highlight: core::parse_flag(query.is_highlight.as_deref()),
        search: query.list.search(),
    };
    list_with(&context, &filter, &query.list).await
}

pub async fn list_by_dataset(
    State(context): State<core::ArcContext>,
    Path(dataset_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = VisualizationFilter {
        dataset_id: Some(&dataset_id),
        search: query.search(),
        ..VisualizationFilter::default()
    };
    list_with(&context, &filter, &query).await
}

pub async fn list_by_organization(
    State(context): State<core::ArcContext>,
    Path(organization_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = VisualizationFilter {
        organization_id: Some(&organization_id),
        search: query.search(),
        ..VisualizationFilter::default()
    };
    list_with(&context, &filter, &query).await
}

pub async fn stats(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, ApiError> {
    let stats = db::visualization_stats(&context.db).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Visualization statistics retrieved successfully", stats))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let visualization = db::get_visualization(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Visualization retrieved successfully", visualization))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<VisualizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let visualization = db::create_visualization(&context.db, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::created("Visualization created successfully", visualization))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<VisualizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let visualization = db::update_visualization(&context.db, &id, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Visualization updated successfully", visualization))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_visualization(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Visualization deleted successfully"))
}
