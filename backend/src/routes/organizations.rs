use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator};
use crate::core::{non_blank, slugify};
use crate::db::{self, OrganizationFields};

#[derive(Debug, Default, Deserialize)]
pub struct OrganizationListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OrganizationRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

const ORGANIZATION_STATUSES: &[&str] = &["active", "inactive"];

impl OrganizationRequest {
    fn into_fields(self) -> Result<OrganizationFields, ApiError> {
        let mut validator = Validator::new();
        validator
            .required("code", &self.code)
            .alphanumeric("code", self.code.trim())
            .min_len("name", &self.name, 2);
        if let Some(email) = non_blank(self.email.clone()) {
            validator.email("email", &email);
        }
        if let Some(status) = &self.status {
            validator.one_of("status", status, ORGANIZATION_STATUSES);
        }
        validator.finish()?;

        let name = self.name.trim().to_string();
        Ok(OrganizationFields {
            code: self.code.trim().to_uppercase(),
            slug: slugify(&name),
            name,
            description: non_blank(self.description),
            logo_url: non_blank(self.logo_url),
            phone_number: non_blank(self.phone_number),
            address: non_blank(self.address),
            website_url: non_blank(self.website_url),
            email: non_blank(self.email),
            status: self.status.unwrap_or_else(|| "active".to_string()),
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    match e {
        e if e.violates("organizations.code") => ApiError::Conflict("Organization code already exists".to_string()),
        e => ApiError::from_db(e, "Organization"),
    }
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<OrganizationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = db::list_organizations(
        &context.db,
        core::non_empty(query.status.as_deref()),
        query.list.search(),
        query.list.sort(db::ORGANIZATION_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Organizations retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let organization = db::get_organization_by_id(&context.db, &id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Organization retrieved successfully", organization))
}

pub async fn get_by_code(
    State(context): State<core::ArcContext>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let organization = db::get_organization_by_code(&context.db, &code)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Organization retrieved successfully", organization))
}

pub async fn get_by_slug(
    State(context): State<core::ArcContext>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let organization = db::get_organization_by_slug(&context.db, &slug)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Organization retrieved successfully", organization))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<OrganizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let organization = db::create_organization(&context.db, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    tracing::info!(organization_id = %organization.id, code = %organization.code, "Organization created");
    Ok(ApiResponse::created("Organization created successfully", organization))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<OrganizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let organization = db::update_organization(&context.db, &id, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Organization updated successfully", organization))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_organization(&context.db, &id).await.map_err(handle_error)?;
    tracing::info!(organization_id = %id, "Organization deleted");
    Ok(ApiResponse::deleted("Organization deleted successfully"))
}
