use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::core::{self, ApiError};
use crate::middleware::{UPLOAD_PATH, require_auth, require_json};
use crate::routes::{self, taxonomy};

const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Back end server built from routes that are either public or sit behind the auth gate
pub fn create_router(context: core::ArcContext) -> Router {
    let settings = &context.settings;
    let request_timeout = Duration::from_secs(settings.server.request_timeout);
    let body_limit = settings.storage.max_upload_size;

    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes().route_layer(middleware::from_fn_with_state(context.clone(), require_auth)))
        .fallback(not_found);

    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id_header()))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(cors_layer())
                .layer(timeout_layer(request_timeout))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(require_json)),
        )
        .with_state(context)
}

/// Reads open to anonymous callers, plus the token endpoints.
fn public_routes() -> Router<core::ArcContext> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/logout", post(routes::auth::logout))
        // organizations
        .route("/organizations", get(routes::organizations::list))
        .route("/organizations/{id}", get(routes::organizations::get_by_id))
        .route("/organizations/code/{code}", get(routes::organizations::get_by_code))
        .route("/organizations/slug/{slug}", get(routes::organizations::get_by_slug))
        .route("/organizations/{id}/datasets", get(routes::datasets::list_by_organization))
        // datasets
        .route("/datasets", get(routes::datasets::list))
        .route("/datasets/{id}", get(routes::datasets::get_by_id))
        .route("/datasets/slug/{slug}", get(routes::datasets::get_by_slug))
        // lookup tables
        .route("/tags", get(taxonomy::tags::list))
        .route("/tags/{id}", get(taxonomy::tags::get_by_id))
        .route("/topics", get(taxonomy::topics::list))
        .route("/topics/{id}", get(taxonomy::topics::get_by_id))
        .route("/business-fields", get(taxonomy::business_fields::list))
        .route("/business-fields/{id}", get(taxonomy::business_fields::get_by_id))
        .route("/units", get(taxonomy::units::list))
        .route("/units/{id}", get(taxonomy::units::get_by_id))
        // publications
        .route("/publications", get(routes::publications::list))
        .route("/publications/{id}", get(routes::publications::get_by_id))
        .route("/publications/dataset/{id}", get(routes::publications::list_by_dataset))
        .route("/publications/organization/{id}", get(routes::publications::list_by_organization))
        .route("/publications/{id}/download", post(routes::publications::download))
        // visualizations
        .route("/visualizations", get(routes::visualizations::list))
        .route("/visualizations/stats", get(routes::visualizations::stats))
        .route("/visualizations/{id}", get(routes::visualizations::get_by_id))
        .route("/visualizations/dataset/{id}", get(routes::visualizations::list_by_dataset))
        .route("/visualizations/organization/{id}", get(routes::visualizations::list_by_organization))
        // analytics
        .route("/analytics/dashboard", get(routes::analytics::dashboard))
        .route("/analytics/stats/datasets", get(routes::analytics::dataset_stats))
        .route("/analytics/stats/organizations", get(routes::analytics::organization_stats))
        .route("/analytics/stats/users", get(routes::analytics::user_stats))
        .route("/analytics/popular/datasets", get(routes::analytics::popular_datasets))
        .route("/analytics/popular/tags", get(routes::analytics::popular_tags))
        .route("/analytics/trend/datasets", get(routes::analytics::dataset_trend))
}

/// Everything that writes, plus the modules that are private as a whole.
fn protected_routes() -> Router<core::ArcContext> {
    Router::new()
        .route("/auth/revoke-all", post(routes::auth::revoke_all))
        .route("/me", get(routes::auth::me))
        // users
        .route("/users", get(routes::users::list).post(routes::users::create))
        .route(
            "/users/{id}",
            get(routes::users::get_by_id)
                .put(routes::users::update)
                .delete(routes::users::delete),
        )
        .route("/users/{id}/status", patch(routes::users::update_status))
        // organizations
        .route("/organizations", post(routes::organizations::create))
        .route(
            "/organizations/{id}",
            put(routes::organizations::update).delete(routes::organizations::delete),
        )
        // datasets and their rows
        .route("/datasets", post(routes::datasets::create))
        .route("/datasets/{id}", put(routes::datasets::update).delete(routes::datasets::delete))
        .route("/datasets/{id}/status", patch(routes::datasets::update_status))
        .route(
            "/datasets/{id}/data-rows",
            get(routes::data_rows::list)
                .post(routes::data_rows::create)
                .delete(routes::data_rows::delete_all),
        )
        .route("/datasets/{id}/data-rows/bulk", post(routes::data_rows::create_bulk))
        .route("/datasets/{id}/data-rows/stats", get(routes::data_rows::stats))
        .route(
            "/data-rows/{id}",
            get(routes::data_rows::get_by_id)
                .put(routes::data_rows::update)
                .delete(routes::data_rows::delete),
        )
        // lookup tables
        .route("/tags", post(taxonomy::tags::create))
        .route("/tags/{id}", put(taxonomy::tags::update).delete(taxonomy::tags::delete))
        .route("/topics", post(taxonomy::topics::create))
        .route("/topics/{id}", put(taxonomy::topics::update).delete(taxonomy::topics::delete))
        .route("/business-fields", post(taxonomy::business_fields::create))
        .route(
            "/business-fields/{id}",
            put(taxonomy::business_fields::update).delete(taxonomy::business_fields::delete),
        )
        .route("/units", post(taxonomy::units::create))
        .route("/units/{id}", put(taxonomy::units::update).delete(taxonomy::units::delete))
        // publications
        .route("/publications", post(routes::publications::create))
        .route(
            "/publications/{id}",
            put(routes::publications::update).delete(routes::publications::delete),
        )
        .route("/publications/{id}/status", patch(routes::publications::update_status))
        // visualizations
        .route("/visualizations", post(routes::visualizations::create))
        .route(
            "/visualizations/{id}",
            put(routes::visualizations::update).delete(routes::visualizations::delete),
        )
        // feedbacks
        .route("/feedbacks", get(routes::feedbacks::list).post(routes::feedbacks::create))
        .route(
            "/feedbacks/{id}",
            get(routes::feedbacks::get_by_id)
                .put(routes::feedbacks::update)
                .delete(routes::feedbacks::delete),
        )
        .route("/feedbacks/{id}/status", patch(routes::feedbacks::update_status))
        // files
        .route("/files", get(routes::files::list))
        .route(UPLOAD_PATH, post(routes::files::upload))
        .route("/files/dataset/{id}", get(routes::files::list_by_dataset))
        .route(
            "/files/{id}",
            get(routes::files::get_by_id)
                .put(routes::files::update)
                .delete(routes::files::delete),
        )
        .route("/files/{id}/status", patch(routes::files::update_status))
        // settings
        .route("/settings", get(routes::settings::list).post(routes::settings::create))
        .route("/settings/keys", get(routes::settings::get_values))
        .route("/settings/key/{key}", get(routes::settings::get_by_key))
        .route("/settings/category/{category}", get(routes::settings::list_by_category))
        .route(
            "/settings/{id}",
            get(routes::settings::get_by_id)
                .put(routes::settings::update)
                .delete(routes::settings::delete),
        )
        // notifications
        .route(
            "/notifications",
            get(routes::notifications::list).post(routes::notifications::create),
        )
        .route("/notifications/bulk", post(routes::notifications::create_bulk))
        .route("/notifications/mark-read", post(routes::notifications::mark_read))
        .route("/notifications/mark-all-read", post(routes::notifications::mark_all_read))
        .route("/notifications/unread-count", get(routes::notifications::unread_count))
        .route(
            "/notifications/{id}",
            get(routes::notifications::get_by_id)
                .put(routes::notifications::update)
                .delete(routes::notifications::delete),
        )
        // tickets
        .route("/tickets", get(routes::tickets::list).post(routes::tickets::create))
        .route(
            "/tickets/{id}",
            get(routes::tickets::get_by_id)
                .put(routes::tickets::update)
                .delete(routes::tickets::delete),
        )
        .route("/tickets/{id}/status", patch(routes::tickets::update_status))
        .route("/tickets/{id}/assign", patch(routes::tickets::assign))
        // integrations
        .route(
            "/integrations",
            get(routes::integrations::list).post(routes::integrations::create),
        )
        .route(
            "/integrations/{id}",
            get(routes::integrations::get_by_id)
                .put(routes::integrations::update)
                .delete(routes::integrations::delete),
        )
        .route("/integrations/{id}/status", patch(routes::integrations::update_status))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(CORS_MAX_AGE)
}

/// Requests still running after `timeout` are dropped and answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

fn request_id_header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(error_message = %detail, "Handler panicked");
    ApiError::Internal(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_slow_requests_time_out() {
        let router = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .route("/fast", get(|| async { "done" }))
            .layer(timeout_layer(Duration::from_millis(50)));
        let server = TestServer::new(router).unwrap();

        server.get("/slow").await.assert_status(StatusCode::REQUEST_TIMEOUT);
        server.get("/fast").await.assert_status_ok();
    }
}
