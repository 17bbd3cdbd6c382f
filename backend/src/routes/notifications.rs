use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, NotificationFields, NotificationFilter};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub is_read: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotificationRequest {
    pub user_id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: String,
    pub action_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BulkNotificationRequest {
    pub user_ids: Vec<String>,
    #[serde(flatten)]
    pub notification: NotificationRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MarkReadRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedCount {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

impl NotificationRequest {
    fn fields(&self) -> Result<NotificationFields, ApiError> {
        let kind = non_blank(self.kind.clone()).unwrap_or_else(|| "info".to_string());
        Validator::new()
            .required("title", &self.title)
            .max_len("title", self.title.trim(), 255)
            .required("message", &self.message)
            .required("category", &self.category)
            .one_of("type", &kind, db::NOTIFICATION_TYPES)
            .finish()?;
        Ok(NotificationFields {
            title: self.title.trim().to_string(),
            message: self.message.trim().to_string(),
            kind,
            category: self.category.trim().to_string(),
            action_url: non_blank(self.action_url.clone()),
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Notification")
}

pub async fn list(
    State(context): State<core::ArcContext>,
    identity: Identity,
    QueryParams(query): QueryParams<NotificationListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = NotificationFilter {
        kind: query.kind.as_deref(),
        category: query.category.as_deref(),
        is_read: core::parse_flag(query.is_read.as_deref()),
        search: query.list.search(),
    };
    let page = db::list_notifications(
        &context.db,
        &identity.user_id,
        &filter,
        query.list.sort(db::NOTIFICATION_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Notifications retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let notification = db::get_notification(&context.db, &identity.user_id, &id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Notification retrieved successfully", notification))
}

/// Without a `user_id` the notification is addressed to the caller.
pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<NotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.fields()?;
    let recipient = non_blank(request.user_id).unwrap_or(identity.user_id);
    let notification = db::create_notification(&context.db, &recipient, &fields)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::created("Notification created successfully", notification))
}

pub async fn create_bulk(
    State(context): State<core::ArcContext>,
    JsonBody(request): JsonBody<BulkNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user_ids: Vec<String> = request
        .user_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    user_ids.sort();
    user_ids.dedup();
    Validator::new().non_empty_list("user_ids", &user_ids).finish()?;
    let fields = request.notification.fields()?;
    let created = db::create_notifications_bulk(&context.db, &user_ids, &fields)
        .await
        .map_err(handle_error)?;
    tracing::info!(count = created.len(), "Notifications sent");
    Ok(ApiResponse::created("Notifications created successfully", created))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<NotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.fields()?;
    let notification = db::update_notification(&context.db, &identity.user_id, &id, &fields)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Notification updated successfully", notification))
}

pub async fn mark_read(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new().non_empty_list("ids", &request.ids).finish()?;
    let updated = db::mark_notifications_read(&context.db, &identity.user_id, &request.ids)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Notifications marked as read", UpdatedCount { updated }))
}

pub async fn mark_all_read(
    State(context): State<core::ArcContext>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let updated = db::mark_all_notifications_read(&context.db, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("All notifications marked as read", UpdatedCount { updated }))
}

pub async fn unread_count(
    State(context): State<core::ArcContext>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    let count = db::count_unread_notifications(&context.db, &identity.user_id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::ok("Unread count retrieved successfully", UnreadCount { count }))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_notification(&context.db, &identity.user_id, &id)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::deleted("Notification deleted successfully"))
}
