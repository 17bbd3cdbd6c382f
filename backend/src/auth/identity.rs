use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::Claims;
use crate::core::ApiError;

/// Caller identity placed in the request extensions by the auth gate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub organization_id: String,
    pub role_id: String,
    pub email: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            organization_id: claims.organization_id,
            role_id: claims.role_id,
            email: claims.email,
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
    }
}
