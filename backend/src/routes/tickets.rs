use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::Identity;
use crate::core::{self, ApiError, ApiResponse, DbError, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, non_blank};
use crate::db::{self, TicketFields, TicketFilter};

#[derive(Debug, Default, Deserialize)]
pub struct TicketListQuery {
    #[serde(flatten)]
    pub list: ListQuery,
    pub user_id: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TicketRequest {
    pub title: String,
    pub description: String,
    pub priority: Option<String>,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TicketStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignRequest {
    pub assigned_to: Option<String>,
}

impl TicketRequest {
    fn into_fields(self) -> Result<TicketFields, ApiError> {
        let priority = non_blank(self.priority).unwrap_or_else(|| "medium".to_string());
        Validator::new()
            .min_len("title", self.title.trim(), 3)
            .max_len("title", self.title.trim(), 255)
            .min_len("description", self.description.trim(), 10)
            .required("category", &self.category)
            .one_of("priority", &priority, db::TICKET_PRIORITIES)
            .finish()?;
        Ok(TicketFields {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            priority,
            category: self.category.trim().to_string(),
        })
    }
}

fn handle_error(e: DbError) -> ApiError {
    ApiError::from_db(e, "Ticket")
}

pub async fn list(
    State(context): State<core::ArcContext>,
    QueryParams(query): QueryParams<TicketListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = TicketFilter {
        user_id: query.user_id.as_deref(),
        assigned_to: query.assigned_to.as_deref(),
        status: query.status.as_deref(),
        priority: query.priority.as_deref(),
        category: query.category.as_deref(),
        search: query.list.search(),
    };
    let page = db::list_tickets(
        &context.db,
        &filter,
        query.list.sort(db::TICKET_SORT_COLUMNS),
        query.list.page_request(MAX_LIMIT),
    )
    .await
    .map_err(handle_error)?;
    Ok(ApiResponse::page("Tickets retrieved successfully", page))
}

pub async fn get_by_id(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = db::get_ticket(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::ok("Ticket retrieved successfully", ticket))
}

pub async fn create(
    State(context): State<core::ArcContext>,
    identity: Identity,
    JsonBody(request): JsonBody<TicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let ticket = db::create_ticket(&context.db, &fields, &identity.user_id)
        .await
        .map_err(handle_error)?;
    tracing::info!(ticket_id = %ticket.id, user_id = %identity.user_id, "Ticket opened");
    Ok(ApiResponse::created("Ticket created successfully", ticket))
}

pub async fn update(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<TicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = request.into_fields()?;
    let ticket = db::update_ticket(&context.db, &id, &fields).await.map_err(handle_error)?;
    Ok(ApiResponse::updated("Ticket updated successfully", ticket))
}

pub async fn update_status(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<TicketStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = request.status.trim();
    Validator::new().one_of("status", status, db::TICKET_STATUSES).finish()?;
    let ticket = db::update_ticket_status(&context.db, &id, status)
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Ticket status updated successfully", ticket))
}

/// An empty `assigned_to` unassigns the ticket.
pub async fn assign(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assignee = non_blank(request.assigned_to);
    let ticket = db::assign_ticket(&context.db, &id, assignee.as_deref())
        .await
        .map_err(handle_error)?;
    Ok(ApiResponse::updated("Ticket assigned successfully", ticket))
}

pub async fn delete(
    State(context): State<core::ArcContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    db::delete_ticket(&context.db, &id).await.map_err(handle_error)?;
    Ok(ApiResponse::deleted("Ticket deleted successfully"))
}
