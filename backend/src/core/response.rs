use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::{DbError, Page, PageMeta};

/// Canonical response codes carried in the `code` field of every body.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    OperationSuccessful,
    ResourceCreated,
    ResourceUpdated,
    ResourceDeleted,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    ValidationFailed,
    InternalServerError,
    ServiceUnavailable,
    TooManyRequests,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SuccessBody<T> {
    code: ResponseCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<PageMeta>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: ResponseCode,
    message: String,
    details: &'a [FieldError],
}

/// Success envelope: `{code, message, data}` or `{code, message, data, meta}` for lists.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    body: SuccessBody<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn with(status: StatusCode, code: ResponseCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            body: SuccessBody {
                code,
                message: message.into(),
                data,
                meta: None,
            },
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with(StatusCode::OK, ResponseCode::OperationSuccessful, message, Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with(StatusCode::CREATED, ResponseCode::ResourceCreated, message, Some(data))
    }

    pub fn updated(message: impl Into<String>, data: T) -> Self {
        Self::with(StatusCode::OK, ResponseCode::ResourceUpdated, message, Some(data))
    }
}

impl ApiResponse<()> {
    pub fn deleted(message: impl Into<String>) -> Self {
        Self::with(StatusCode::OK, ResponseCode::ResourceDeleted, message, None)
    }

    pub fn done(message: impl Into<String>) -> Self {
        Self::with(StatusCode::OK, ResponseCode::ResourceUpdated, message, None)
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn page(message: impl Into<String>, page: Page<T>) -> Self {
        let mut response = Self::with(StatusCode::OK, ResponseCode::OperationSuccessful, message, Some(page.rows));
        response.body.meta = Some(page.meta);
        response
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// HTTP-facing error taxonomy. Every module error converts into one of these at the boundary.
#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn internal(source: impl std::fmt::Display) -> Self {
        Self::Internal(source.to_string())
    }

    /// Default translation of repository failures, `resource` naming the entity in messages.
    #[must_use]
    pub fn from_db(e: DbError, resource: &str) -> Self {
        match e {
            DbError::RowNotFound => Self::NotFound(format!("{resource} not found")),
            DbError::UniqueViolation(_) => Self::Conflict(format!("{resource} already exists")),
            DbError::ForeignKeyViolation(_) => Self::BadRequest("Referenced record does not exist".to_string()),
            DbError::ConnectionFailed(_) | DbError::OperationFailed(_) => Self::internal(e),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ResponseCode {
        match self {
            Self::BadRequest(_) | Self::UnsupportedMediaType => ResponseCode::BadRequest,
            Self::Validation(_) => ResponseCode::ValidationFailed,
            Self::Unauthorized(_) => ResponseCode::Unauthorized,
            Self::Forbidden(_) => ResponseCode::Forbidden,
            Self::NotFound(_) => ResponseCode::NotFound,
            Self::Conflict(_) => ResponseCode::Conflict,
            Self::ServiceUnavailable(_) => ResponseCode::ServiceUnavailable,
            Self::Internal(_) => ResponseCode::InternalServerError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(detail) = &self {
            tracing::error!(
                error_type = %std::any::type_name::<Self>(),
                error_message = %detail,
                "request failed");
        } else {
            tracing::debug!(status = %status, error_message = %self, "request rejected");
        }

        let details: &[FieldError] = match &self {
            Self::Validation(details) => details,
            _ => &[],
        };
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// JSON body extractor answering with the error envelope instead of axum's plain-text rejection.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(reason = %rejection.body_text(), "rejected request body");
                Err(ApiError::BadRequest("Invalid request body".to_string()))
            }
        }
    }
}

/// Query string extractor with the same rejection shape as `JsonBody`.
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(reason = %rejection.body_text(), "rejected query string");
                Err(ApiError::BadRequest("Invalid query parameters".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes_serialize_in_screaming_snake_case() {
        let code = serde_json::to_value(ResponseCode::OperationSuccessful).unwrap();
        assert_eq!(code, "OPERATION_SUCCESSFUL");
        let code = serde_json::to_value(ResponseCode::ValidationFailed).unwrap();
        assert_eq!(code, "VALIDATION_FAILED");
    }

    #[test]
    fn test_error_kinds_map_to_statuses() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Validation(vec![]).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::Conflict("x".into()).code(), ResponseCode::Conflict);
        assert_eq!(ApiError::internal("boom").to_string(), "Internal server error");
    }

    #[test]
    fn test_repository_failures_translate_per_resource() {
        let e = ApiError::from_db(DbError::RowNotFound, "Tag");
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        assert_eq!(e.to_string(), "Tag not found");

        let e = ApiError::from_db(DbError::UniqueViolation("settings.key".into()), "Setting");
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e = ApiError::from_db(DbError::ForeignKeyViolation("x".into()), "Dataset");
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_field_error_omits_missing_field() {
        let detail = FieldError {
            field: None,
            message: "bad".to_string(),
        };
        let value = serde_json::to_value(detail).unwrap();
        assert!(value.get("field").is_none());
        assert_eq!(value["message"], "bad");
    }
}
