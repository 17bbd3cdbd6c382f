use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use crate::core::{self, ApiError, ApiResponse};

/// Liveness probe that also round-trips the database.
pub async fn health_check(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&context.db)
        .await
        .map_err(|e| {
            tracing::error!(error_message = %e, "Health check failed to reach the database");
            ApiError::ServiceUnavailable("Database unavailable".to_string())
        })?;

    Ok(ApiResponse::ok(
        "Service is healthy",
        json!({ "status": "ok", "version": context.settings.server.version }),
    ))
}
