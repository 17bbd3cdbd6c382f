use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, affected, fetch_page,
    live_rows,
};

pub const TICKET_SORT_COLUMNS: &[&str] = &["priority", "status", "created_at", "updated_at"];
pub const TICKET_STATUSES: &[&str] = &["open", "in_progress", "resolved", "closed"];
pub const TICKET_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];
pub const STATUS_RESOLVED: &str = "resolved";

const TICKET_COLUMNS: &str = "id, title, description, status, priority, category, user_id, assigned_to, resolved_at, \
     created_by, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub user_id: String,
    pub assigned_to: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TicketFields {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub category: String,
}

#[derive(Debug, Default)]
pub struct TicketFilter<'a> {
    pub user_id: Option<&'a str>,
    pub assigned_to: Option<&'a str>,
    pub status: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub category: Option<&'a str>,
    pub search: Option<&'a str>,
}

pub async fn list_tickets(
    db: &DbContext,
    filter: &TicketFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Ticket>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .eq("user_id", filter.user_id)
        .eq("assigned_to", filter.assigned_to)
        .eq("status", filter.status)
        .eq("priority", filter.priority)
        .eq("category", filter.category)
        .search(&["title", "description"], filter.search);

    let statement = ListStatement {
        select: TICKET_COLUMNS,
        ..ListStatement::table("tickets")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn get_ticket(db: &DbContext, id: &str) -> Result<Ticket, DbError> {
    let sql = format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Ticket>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

/// Opens a ticket on behalf of `user_id`.
pub async fn create_ticket(db: &DbContext, fields: &TicketFields, user_id: &str) -> Result<Ticket, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO tickets (id, title, description, status, priority, category, user_id, created_by, \
         created_at, updated_at) VALUES (?, ?, ?, 'open', ?, ?, ?, ?, ?, ?) RETURNING {TICKET_COLUMNS}"
    );
    let ticket = sqlx::query_as::<_, Ticket>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.priority)
        .bind(&fields.category)
        .bind(user_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(ticket)
}

pub async fn update_ticket(db: &DbContext, id: &str, fields: &TicketFields) -> Result<Ticket, DbError> {
    let sql = format!(
        "UPDATE tickets SET title = ?, description = ?, priority = ?, category = ?, updated_at = ? \
         WHERE id = ? AND {} RETURNING {TICKET_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Ticket>(&sql)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.priority)
        .bind(&fields.category)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

/// Moving to `resolved` stamps `resolved_at`; any other status clears it.
pub async fn update_ticket_status(db: &DbContext, id: &str, status: &str) -> Result<Ticket, DbError> {
    let now = Utc::now();
    let resolved_at = (status == STATUS_RESOLVED).then_some(now);
    let sql = format!(
        "UPDATE tickets SET status = ?, resolved_at = ?, updated_at = ? WHERE id = ? AND {} \
         RETURNING {TICKET_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Ticket>(&sql)
        .bind(status)
        .bind(resolved_at)
        .bind(now)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn assign_ticket(db: &DbContext, id: &str, assigned_to: Option<&str>) -> Result<Ticket, DbError> {
    let sql = format!(
        "UPDATE tickets SET assigned_to = ?, updated_at = ? WHERE id = ? AND {} RETURNING {TICKET_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Ticket>(&sql)
        .bind(assigned_to)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_ticket(db: &DbContext, id: &str) -> Result<(), DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE tickets SET deleted_at = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(now).bind(now).bind(id).execute(db).await?;
    affected(result.rows_affected())
}
