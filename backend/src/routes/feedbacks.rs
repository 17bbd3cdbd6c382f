use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, FeedbackFields, FeedbackFilter};

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub dataset_id: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackRequest {
    pub dataset_id: Option<String>,
    pub rating: i64,
    pub comment: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackStatusRequest {
    pub status: String,
}

impl FeedbackRequest {
    fn into_fields(self) -> Result<FeedbackFields, ApiError> {
        let comment = self.comment.trim().to_string();
        Validator::new()
            .range("rating", self.rating, 1, 5)
            .min_len("comment", &comment, 10)
            .max_len("comment", &comment, 1000)
            .required("category", &self.category)
            .finish()?;
        Ok(FeedbackFields {
            dataset_id: non_blank(self.dataset_id),
            rating: self.rating,
            comment,
            category: self.category.trim().to_string(),
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Feedback")
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<FeedbackListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = FeedbackFilter {
        dataset_id: query.dataset_id.as_deref(),
        category: query.category.as_deref(),
        status: query.status.as_deref(),
        user_id: query.user_id.as_deref(),
        search: query.list.search(),
    };
    let page = db::list_feedbacks(
        &context.db,
        &filter,
        query.list.sort(db::FEEDBACK_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Feedbacks retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = db::get_feedback(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Feedback retrieved successfully", feedback))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let feedback = db::create_feedback(&context.db, &identity.user_id, &fields)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::created("Feedback created successfully", feedback))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let feedback = db::update_feedback(&context.db, &id, &fields).await.map_err(handle_error)?;
    Ok(ApiResponse::updated("Feedback updated successfully", feedback))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<FeedbackStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = request.status.trim();
    Validator::new().one_of("status", status, db::FEEDBACK_STATUSES).finish()?;
    let feedback = db::update_feedback_status(&context.db, &id, status)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Feedback status updated successfully", feedback))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_feedback(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Feedback deleted successfully"))
}
