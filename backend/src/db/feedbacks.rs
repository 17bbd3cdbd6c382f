use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{DbContext, DbError, ListStatement, Page, PageRequest, SortSpec, SqlFilter, affected, fetch_page};

pub const FEEDBACK_SORT_COLUMNS: &[&str] = &["rating", "created_at", "updated_at"];
pub const FEEDBACK_STATUSES: &[&str] = &["pending", "reviewed", "resolved"];

const FEEDBACK_COLUMNS: &str = "id, user_id, dataset_id, rating, comment, category, status, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Feedback {
    pub id: String,
    pub user_id: String,
    pub dataset_id: Option<String>,
    pub rating: i64,
    pub comment: String,
    pub category: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct FeedbackFields {
    pub dataset_id: Option<String>,
    pub rating: i64,
    pub comment: String,
    pub category: String,
}

#[derive(Debug, Default)]
pub struct FeedbackFilter<'a> {
    pub dataset_id: Option<&'a str>,
    pub category: Option<&'a str>,
    pub status: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub search: Option<&'a str>,
}

pub async fn list_feedbacks(
    db: &DbContext,
    filter: &FeedbackFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Feedback>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .eq("dataset_id", filter.dataset_id)
        .eq("category", filter.category)
        .eq("status", filter.status)
        .eq("user_id", filter.user_id)
        .search(&["comment"], filter.search);

    let statement = ListStatement {
        select: FEEDBACK_COLUMNS,
        ..ListStatement::table("feedbacks")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn get_feedback(db: &DbContext, id: &str) -> Result<Feedback, DbError> {
    let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedbacks WHERE id = ?");
    sqlx::query_as::<_, Feedback>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_feedback(db: &DbContext, user_id: &str, fields: &FeedbackFields) -> Result<Feedback, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO feedbacks (id, user_id, dataset_id, rating, comment, category, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?) RETURNING {FEEDBACK_COLUMNS}"
    );
    let feedback = sqlx::query_as::<_, Feedback>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&fields.dataset_id)
        .bind(fields.rating)
        .bind(&fields.comment)
        .bind(&fields.category)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(feedback)
}

pub async fn update_feedback(db: &DbContext, id: &str, fields: &FeedbackFields) -> Result<Feedback, DbError> {
    let sql = format!(
        "UPDATE feedbacks SET dataset_id = ?, rating = ?, comment = ?, category = ?, updated_at = ? \
         WHERE id = ? RETURNING {FEEDBACK_COLUMNS}"
    );
    sqlx::query_as::<_, Feedback>(&sql)
        .bind(&fields.dataset_id)
        .bind(fields.rating)
        .bind(&fields.comment)
        .bind(&fields.category)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn update_feedback_status(db: &DbContext, id: &str, status: &str) -> Result<Feedback, DbError> {
    let sql = format!("UPDATE feedbacks SET status = ?, updated_at = ? WHERE id = ? RETURNING {FEEDBACK_COLUMNS}");
    sqlx::query_as::<_, Feedback>(&sql)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_feedback(db: &DbContext, id: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM feedbacks WHERE id = ?").bind(id).execute(db).await?;
    affected(result.rows_affected())
}
