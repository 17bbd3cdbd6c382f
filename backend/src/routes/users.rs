use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator};
use crate::core::non_blank;
use crate::db::{self, NewUser, UserChanges, UserFilter};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub organization_id: Option<String>,
    pub role_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub employee_id: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub employee_id: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub thumbnail: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserStatusRequest {
    pub status: String,
}

fn handle_error(e: DbError) -> ApiError {
    match e {
        e if e.violates("users.email") => ApiError::Conflict("Email already registered".to_string()),
        e if e.violates("users.username") => ApiError::Conflict("Username already taken".to_string()),
        e => ApiError::from_db(e, "User"),
    }
}

/// Pre-checks the live-user uniqueness of email and username.
async fn ensure_unique(context: &core::Context, email: &str, username: &str, except_id: Option<&str>) -> Result<(), ApiError> {
    if db::email_taken(&context.db, email, except_id).await.map_err(handle_error)? {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }
    if db::username_taken(&context.db, username, except_id).await.map_err(handle_error)? {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }
    Ok(())
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = UserFilter {
        organization_id: query.organization_id.as_deref(),
        role_id: query.role_id.as_deref(),
        status: query.status.as_deref(),
        search: query.list.search(),
    };
    let page = db::list_users(
        &context.db,
        &filter,
        query.list.sort(db::USER_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Users retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = db::get_user_by_id(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("User retrieved successfully", user))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .required("organization_id", &request.organization_id)
        .required("role_id", &request.role_id)
        .required("name", &request.name)
        .min_len("username", &request.username, 3)
        .alphanumeric("username", &request.username)
        .email("email", &request.email)
        .min_len("password", &request.password, auth::MIN_PASSWORD_LENGTH)
        .finish()?;

    let email = request.email.trim().to_string();
    ensure_unique(&context, &email, &request.username, None).await?;

    let password_hash = auth::spawn_hash_password(request.password).await.map_err(ApiError::internal)?;
    let new_user = NewUser {
        organization_id: request.organization_id,
        role_id: request.role_id,
        name: request.name.trim().to_string(),
        username: request.username,
        email,
        password_hash,
        employee_id: non_blank(request.employee_id),
        position: non_blank(request.position),
        address: non_blank(request.address),
        phone: non_blank(request.phone),
    };
    let user = db::create_user(&context.db, &new_user).await.map_err(handle_error)?;
    tracing::info!(user_id = %user.id, "User created");
    Ok(ApiResponse::created("User created successfully", user))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .required("organization_id", &request.organization_id)
        .required("role_id", &request.role_id)
        .required("name", &request.name)
        .min_len("username", &request.username, 3)
        .alphanumeric("username", &request.username)
        .email("email", &request.email)
        .finish()?;

    let email = request.email.trim().to_string();
    ensure_unique(&context, &email, &request.username, Some(&id)).await?;

    let changes = UserChanges {
        organization_id: request.organization_id,
        role_id: request.role_id,
        name: request.name.trim().to_string(),
        username: request.username,
        email,
        employee_id: non_blank(request.employee_id),
        position: non_blank(request.position),
        address: non_blank(request.address),
        phone: non_blank(request.phone),
        thumbnail: non_blank(request.thumbnail),
        bio: non_blank(request.bio),
    };
    let user = db::update_user(&context.db, &id, &changes).await.map_err(handle_error)?;
    Ok(ApiResponse::updated("User updated successfully", user))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UserStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .one_of("status", request.status.trim(), db::USER_STATUSES)
        .finish()?;
    db::update_user_status(&context.db, &id, request.status.trim())
        .await
        .map_err(handle_error)?;
    let user = db::get_user_by_id(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::updated("User status updated successfully", user))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_user(&context.db, &id).await.map_err(handle_error)?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(ApiResponse::deleted("User deleted successfully"))
}
