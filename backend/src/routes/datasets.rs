use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, DatasetFields, DatasetFilter};
use crate::services::datasets::{self as usecase, DatasetError, DatasetInput};

#[derive(Debug, Default, Deserialize)]
pub struct DatasetListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub organization_id: Option<String>,
    pub topic_id: Option<String>,
    pub business_field_id: Option<String>,
    pub tag_id: Option<String>,
    pub status: Option<String>,
    pub validation_status: Option<String>,
    pub classification: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatasetRequest {
    pub name: String,
    pub description: Option<String>,
    pub classification: String,
    pub category: String,
    pub period: Option<String>,
    pub unit_id: Option<String>,
    pub business_field_id: Option<String>,
    pub topic_id: Option<String>,
    pub reference_id: Option<String>,
    pub image: Option<String>,
    pub metadatas: Option<serde_json::Value>,
    pub validation_status: Option<String>,
    pub is_highlight: bool,
    pub data_fixed: bool,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusRequest {
    pub status: String,
}

impl DatasetRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut validator = Validator::new();
        validator
            .min_len("name", &self.name, 2)
            .max_len("name", &self.name, 255)
            .required("classification", &self.classification)
            .required("category", &self.category);
        if let Some(validation_status) = &self.validation_status {
            validator.one_of("validation_status", validation_status, db::VALIDATION_STATUSES);
        }
        validator.finish()
    }

    fn into_input(self) -> DatasetInput {
        DatasetInput {
            fields: DatasetFields {
                name: self.name.trim().to_string(),
                slug: String::new(),
                description: non_blank(self.description),
                classification: self.classification.trim().to_string(),
                category: self.category.trim().to_string(),
                period: non_blank(self.period),
                unit_id: non_blank(self.unit_id),
                business_field_id: non_blank(self.business_field_id),
                topic_id: non_blank(self.topic_id),
                reference_id: non_blank(self.reference_id),
                image: non_blank(self.image),
                metadatas: self.metadatas.filter(|v| !v.is_null()).map(|v| v.to_string()),
                validation_status: self.validation_status.unwrap_or_else(|| "pending".to_string()),
                is_highlight: self.is_highlight,
                data_fixed: self.data_fixed,
            },
            tag_ids: self.tag_ids,
        }
    }
}

fn handle_error(e: DatasetError) -> ApiError {
    match e {
        DatasetError::NotFound => ApiError::NotFound(e.to_string()),
        DatasetError::OrganizationRequired | DatasetError::InvalidReference => ApiError::BadRequest(e.to_string()),
        DatasetError::ArchivedStatusLocked => ApiError::Conflict(e.to_string()),
        DatasetError::Database(_) => ApiError::internal(e),
    }
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<DatasetListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = DatasetFilter {
        organization_id: query.organization_id.as_deref(),
        topic_id: query.topic_id.as_deref(),
        business_field_id: query.business_field_id.as_deref(),
        tag_id: query.tag_id.as_deref(),
        status: core::non_empty(query.status.as_deref()),
        validation_status: query.validation_status.as_deref(),
        classification: query.classification.as_deref(),
        search: query.list.search(),
    };
    let page = usecase::list(
        &context,
        &filter,
        query.list.sort(db::DATASET_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Datasets retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = usecase::get_by_id(&context, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Dataset retrieved successfully", dataset))
}

pub async fn get_by_slug(
    State(context): State<core::ArcContext>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = usecase::get_by_slug(&context, &slug).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Dataset retrieved successfully", dataset))
}

pub async fn list_by_organization(
    State(context): State<core::ArcContext>,
    Path(organization_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = db::list_organization_datasets(
        &context.db,
        &organization_id,
        query.sort(db::DATASET_SORT_COLUMNS),
        query.page_request(MAX_LIMIT),
    )
    .await
    .map_err(|e| handle_error(e.into()))?;
    Ok(ApiResponse::page("Datasets retrieved successfully", page))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<DatasetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let dataset = usecase::create(&context, &identity, request.into_input())
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::created("Dataset created successfully", dataset))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<DatasetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let dataset = usecase::update(&context, &identity, &id, request.into_input())
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Dataset updated successfully", dataset))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    usecase::archive(&context, &identity, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Dataset deleted successfully"))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .one_of("status", request.status.trim(), db::DATASET_STATUSES)
        .finish()?;
    let dataset = usecase::update_status(&context, &identity, &id, request.status.trim())
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Dataset status updated successfully", dataset))
}
