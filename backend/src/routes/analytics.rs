use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::core::{self, ApiError, ApiResponse, DbError, QueryParams};
use crate::db;

#[derive(Debug, Default, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub days: Option<String>,
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::internal(e)
}

fn positive(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v > 0)
}

fn popular_limit(query: &PopularQuery) -> i64 {
    positive(query.limit.as_deref())
        .unwrap_or(db::DEFAULT_POPULAR_LIMIT)
        .min(db::MAX_POPULAR_LIMIT)
}

fn trend_days(query: &TrendQuery) -> i64 {
    positive(query.days.as_deref())
        .unwrap_or(db::DEFAULT_TREND_DAYS)
        .min(db::MAX_TREND_DAYS)
}

pub async fn dashboard(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, ApiError> {
    let dashboard = db::dashboard(&context.db).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Dashboard retrieved successfully", dashboard))
}

pub async fn dataset_stats(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, ApiError> {
    let stats = db::dataset_stats(&context.db).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Dataset statistics retrieved successfully", stats))
}

pub async fn organization_stats(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, ApiError> {
    let stats = db::organization_stats(&context.db).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Organization statistics retrieved successfully", stats))
}

pub async fn user_stats(State(context): State<core::ArcContext>) -> Result<impl IntoResponse, ApiError> {
    let stats = db::user_stats(&context.db).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("User statistics retrieved successfully", stats))
}

pub async fn popular_datasets(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<PopularQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let datasets = db::popular_datasets(&context.db, popular_limit(&query))
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Popular datasets retrieved successfully", datasets))
}

pub async fn popular_tags(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<PopularQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = db::popular_tags(&context.db, popular_limit(&query))
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Popular tags retrieved successfully", tags))
}

pub async fn dataset_trend(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<TrendQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let trend = db::dataset_trend(&context.db, trend_days(&query))
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Dataset trend retrieved successfully", trend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popular_limit_defaults_and_caps() {
        let limit = |l: Option<&str>| popular_limit(&PopularQuery { limit: l.map(str::to_string) });
        assert_eq!(limit(None), 10);
        assert_eq!(limit(Some("5")), 5);
        assert_eq!(limit(Some("0")), 10);
        assert_eq!(limit(Some("1000")), 100);
        assert_eq!(limit(Some("x")), 10);
    }

    #[test]
    fn test_trend_days_bounds() {
        let days = |d: Option<&str>| trend_days(&TrendQuery { days: d.map(str::to_string) });
        assert_eq!(days(None), 30);
        assert_eq!(days(Some("7")), 7);
        assert_eq!(days(Some("-1")), 30);
        assert_eq!(days(Some("9999")), 365);
    }
}
