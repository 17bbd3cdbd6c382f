use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::Identity;
use crate::core::{self, ApiError};

/// Rejects requests without a valid bearer access token and hands the caller identity to handlers.
pub async fn require_auth(State(context): State<core::ArcContext>, mut req: Request, next: Next) -> Response {
    match context.jwt.verify_header(req.headers()) {
        Ok(claims) => {
            tracing::debug!(user_id = %claims.user_id, path = %req.uri().path(), "Authenticated request");
            req.extensions_mut().insert(Identity::from(claims));
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(path = %req.uri().path(), error_message = %e, "Unauthorized access attempt");
            ApiError::from(e).into_response()
        }
    }
}

