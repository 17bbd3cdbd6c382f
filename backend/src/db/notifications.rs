use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, SqlValue, affected,
    fetch_page, live_rows,
};

pub const NOTIFICATION_SORT_COLUMNS: &[&str] = &["created_at"];
pub const NOTIFICATION_TYPES: &[&str] = &["info", "success", "warning", "error"];

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, type, category, action_url, read, read_at, created_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub action_url: Option<String>,
    #[sqlx(rename = "read")]
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NotificationFields {
    pub title: String,
    pub message: String,
    pub kind: String,
    pub category: String,
    pub action_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct NotificationFilter<'a> {
    pub kind: Option<&'a str>,
    pub category: Option<&'a str>,
    pub is_read: Option<bool>,
    pub search: Option<&'a str>,
}

/// Lists the notifications addressed to `user_id`.
pub async fn list_notifications(
    db: &DbContext,
    user_id: &str,
    filter: &NotificationFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Notification>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .with("user_id = ?", [SqlValue::from(user_id)])
        .eq("type", filter.kind)
        .eq("category", filter.category)
        .flag("read", filter.is_read)
        .search(&["title", "message"], filter.search);

    let statement = ListStatement {
        select: NOTIFICATION_COLUMNS,
        ..ListStatement::table("notifications")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn get_notification(db: &DbContext, user_id: &str, id: &str) -> Result<Notification, DbError> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ? AND user_id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Notification>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_notification<'e, E>(
    db: E,
    user_id: &str,
    fields: &NotificationFields,
) -> Result<Notification, DbError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO notifications (id, user_id, title, message, type, category, action_url, read, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?) RETURNING {NOTIFICATION_COLUMNS}"
    );
    let notification = sqlx::query_as::<_, Notification>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.message)
        .bind(&fields.kind)
        .bind(&fields.category)
        .bind(&fields.action_url)
        .bind(Utc::now())
        .fetch_one(db)
        .await?;
    Ok(notification)
}

/// Sends the same notification to every recipient, all or nothing.
pub async fn create_notifications_bulk(
    db: &DbContext,
    user_ids: &[String],
    fields: &NotificationFields,
) -> Result<Vec<Notification>, DbError> {
    let mut tx = db.begin().await?;
    let mut created = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        created.push(create_notification(&mut *tx, user_id, fields).await?);
    }
    tx.commit().await?;
    Ok(created)
}

pub async fn update_notification(
    db: &DbContext,
    user_id: &str,
    id: &str,
    fields: &NotificationFields,
) -> Result<Notification, DbError> {
    let sql = format!(
        "UPDATE notifications SET title = ?, message = ?, type = ?, category = ?, action_url = ? \
         WHERE id = ? AND user_id = ? AND {} RETURNING {NOTIFICATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Notification>(&sql)
        .bind(&fields.title)
        .bind(&fields.message)
        .bind(&fields.kind)
        .bind(&fields.category)
        .bind(&fields.action_url)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

/// Marks the given notifications of `user_id` as read; returns how many changed.
pub async fn mark_notifications_read(db: &DbContext, user_id: &str, ids: &[String]) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut filter = SqlFilter::new();
    filter
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .raw("read = 0")
        .with("user_id = ?", [SqlValue::from(user_id)])
        .with(
            format!("id IN ({placeholders})"),
            ids.iter().map(|id| SqlValue::from(id.as_str())),
        );

    let sql = format!("UPDATE notifications SET read = 1, read_at = ?{}", filter.where_clause());
    let args = filter.arguments_around(&[SqlValue::from(Utc::now().to_rfc3339())], &[])?;
    let result = sqlx::query_with(&sql, args).execute(db).await?;
    Ok(result.rows_affected())
}

pub async fn mark_all_notifications_read(db: &DbContext, user_id: &str) -> Result<u64, DbError> {
    let sql = format!(
        "UPDATE notifications SET read = 1, read_at = ? WHERE user_id = ? AND read = 0 AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(Utc::now()).bind(user_id).execute(db).await?;
    Ok(result.rows_affected())
}

pub async fn count_unread_notifications(db: &DbContext, user_id: &str) -> Result<i64, DbError> {
    let sql = format!(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0 AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let count: i64 = sqlx::query_scalar(&sql).bind(user_id).fetch_one(db).await?;
    Ok(count)
}

pub async fn delete_notification(db: &DbContext, user_id: &str, id: &str) -> Result<(), DbError> {
    let sql = format!(
        "UPDATE notifications SET deleted_at = ? WHERE id = ? AND user_id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    affected(result.rows_affected())
}
