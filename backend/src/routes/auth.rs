use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{self, Identity, PasswordError};
use crate::core::{self, ApiError, ApiResponse, FieldError, JsonBody, Validator};
use crate::services::auth::{self as usecase, AuthError, Registration};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
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
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

fn handle_error(e: AuthError) -> ApiError {
    match e {
        AuthError::InvalidCredentials
        | AuthError::InvalidToken
        | AuthError::TokenExpired
        | AuthError::TokenRevoked => ApiError::Unauthorized(e.to_string()),
        AuthError::UserDisabled => ApiError::Forbidden(e.to_string()),
        AuthError::EmailTaken | AuthError::UsernameTaken => ApiError::Conflict(e.to_string()),
        AuthError::UserNotFound => ApiError::NotFound(e.to_string()),
        AuthError::Password(PasswordError::TooShort) => {
            ApiError::Validation(vec![FieldError::new("password", PasswordError::TooShort.to_string())])
        }
        AuthError::Jwt(e) => e.into(),
        AuthError::Password(_) | AuthError::Database(_) => ApiError::internal(e),
    }
}

/// Login route
pub async fn login(
    State(context): State<core::ArcContext>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .required("email", &request.email)
        .required("password", &request.password)
        .finish()?;

    let session = usecase::login(&context, request.email.trim(), &request.password)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Login successful", session))
}

pub async fn register(
    State(context): State<core::ArcContext>,
    JsonBody(request): JsonBody<RegisterRequest>,
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

    let registration = Registration {
        organization_id: request.organization_id,
        role_id: request.role_id,
        name: request.name.trim().to_string(),
        username: request.username,
        email: request.email.trim().to_string(),
        password: request.password,
        employee_id: request.employee_id,
        position: request.position,
        address: request.address,
        phone: request.phone,
    };
    let session = usecase::register(&context, registration).await.map_err(handle_error)?;
    Ok(ApiResponse::created("Registration successful", session))
}

/// Route to rotate a refresh token into a new pair
pub async fn refresh(
    State(context): State<core::ArcContext>,
    JsonBody(request): JsonBody<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .required("refresh_token", &request.refresh_token)
        .finish()?;

    let session = usecase::refresh(&context, &request.refresh_token)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Token refreshed successfully", session))
}

pub async fn logout(
    State(context): State<core::ArcContext>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = auth::bearer_token(&headers)?;
    Validator::new()
        .required("refresh_token", &request.refresh_token)
        .finish()?;

    usecase::logout(&context, access_token, &request.refresh_token)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok(
        "Logout successful",
        json!({ "message": "Successfully logged out" }),
    ))
}

pub async fn revoke_all(
    State(context): State<core::ArcContext>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = usecase::revoke_all(&context, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok(
        "All tokens revoked successfully",
        json!({ "revoked": revoked }),
    ))
}

/// Current user; the session behind the presented token must still be valid.
pub async fn me(
    State(context): State<core::ArcContext>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = auth::bearer_token(&headers)?;
    let claims = usecase::validate(&context, access_token).await.map_err(handle_error)?;
    let user = usecase::current_user(&context, &claims.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("User retrieved successfully", user))
}
