use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, Publication, PublicationFields, PublicationFilter};

#[derive(Debug, Default, Deserialize)]
pub struct PublicationListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub status: Option<String>,
    pub is_featured: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublicationRequest {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub doi: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
    pub status: Option<String>,
    pub is_featured: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublicationStatusRequest {
    pub status: String,
}

impl PublicationRequest {
    fn into_fields(self) -> Result<PublicationFields, ApiError> {
        let status = non_blank(self.status).unwrap_or_else(|| "draft".to_string());
        Validator::new()
            .min_len("title", self.title.trim(), 2)
            .max_len("title", self.title.trim(), 255)
            .required("content", &self.content)
            .one_of("status", &status, db::PUBLICATION_STATUSES)
            .finish()?;
        Ok(PublicationFields {
            title: self.title.trim().to_string(),
            description: non_blank(self.description),
            content: self.content,
            doi: non_blank(self.doi),
            publisher: non_blank(self.publisher),
            published_date: non_blank(self.published_date),
            dataset_id: non_blank(self.dataset_id),
            organization_id: non_blank(self.organization_id),
            authors: non_blank(self.authors),
            tags: non_blank(self.tags),
            status,
            is_featured: self.is_featured,
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Publication")
}

async fn list_with(
    context: &core::Context,
    filter: &PublicationFilter<'_>,
    list: &ListQuery,
) -> Result<ApiResponse<Vec<Publication>>, ApiError> {
    let page = db::list_publications(
        &context.db,
        filter,
        list.sort(db::PUBLICATION_SORT_COLUMNS),
        list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Publications retrieved successfully", page))
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<PublicationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = PublicationFilter {
        dataset_id: query.dataset_id.as_deref(),
        organization_id: query.organization_id.as_deref(),
        status: query.status.as_deref(),
        is_featured: core::parse_flag(query.is_featured.as_deref()),
        search: query.list.search(),
    };
    list_with(&context, &filter, &query.list).await
}

pub async fn list_by_dataset(
    State(context): State<core::ArcContext>,
    Path(dataset_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = PublicationFilter {
        dataset_id: Some(&dataset_id),
        search: query.search(),
        ..PublicationFilter::default()
    };
    list_with(&context, &filter, &query).await
}

pub async fn list_by_organization(
    State(context): State<core::ArcContext>,
    Path(organization_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = PublicationFilter {
        organization_id: Some(&organization_id),
        search: query.search(),
        ..PublicationFilter::default()
    };
    list_with(&context, &filter, &query).await
}

/// Every successful read counts as a view.
pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let publication = db::view_publication(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Publication retrieved successfully", publication))
}

pub async fn download(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let publication = db::record_publication_download(&context.db, &id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Publication download recorded", publication))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<PublicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let publication = db::create_publication(&context.db, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    tracing::info!(publication_id = %publication.id, "Publication created");
    Ok(ApiResponse::created("Publication created successfully", publication))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<PublicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let publication = db::update_publication(&context.db, &id, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Publication updated successfully", publication))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<PublicationStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = request.status.trim();
    Validator::new().one_of("status", status, db::PUBLICATION_STATUSES).finish()?;
    let publication = db::update_publication_status(&context.db, &id, status, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Publication status updated successfully", publication))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_publication(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Publication deleted successfully"))
}
