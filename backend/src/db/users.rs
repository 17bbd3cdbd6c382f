use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor};
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, affected, fetch_page,
    live_rows,
};

pub const USER_SORT_COLUMNS: &[&str] = &["name", "username", "email", "created_at", "updated_at"];
pub const USER_STATUSES: &[&str] = &["active", "inactive", "suspended"];

const USER_COLUMNS: &str = "id, organization_id, role_id, name, username, employee_id, position, email, \
     password_hash, address, phone, thumbnail, bio, status, created_at, updated_at";

#[derive(Clone, Debug, Deserialize, FromRow, Serialize)]
pub struct User {
    pub id: String,
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub employee_id: Option<String>,
    pub position: Option<String>,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub thumbnail: Option<String>,
    pub bio: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug)]
pub struct NewUser {
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub employee_id: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Profile fields replaced by an update; credentials change through their own paths.
#[derive(Debug)]
pub struct UserChanges {
    pub organization_id: String,
    pub role_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub employee_id: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub thumbnail: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Default)]
pub struct UserFilter<'a> {
    pub organization_id: Option<&'a str>,
    pub role_id: Option<&'a str>,
    pub status: Option<&'a str>,
    pub search: Option<&'a str>,
}

pub async fn create_user<'e, E>(db: E, new_user: &NewUser) -> Result<User, DbError>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO users (id, organization_id, role_id, name, username, employee_id, position, email, \
         password_hash, address, phone, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?) RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&new_user.organization_id)
        .bind(&new_user.role_id)
        .bind(&new_user.name)
        .bind(&new_user.username)
        .bind(&new_user.employee_id)
        .bind(&new_user.position)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.address)
        .bind(&new_user.phone)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(user)
}

async fn get_user_where<'e, E>(db: E, column: &'static str, value: &str) -> Result<User, DbError>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ? AND {}",
        live_rows(SoftDelete::Status, "")
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(value)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn get_user_by_id<'e, E>(db: E, id: &str) -> Result<User, DbError>
where
    E: SqliteExecutor<'e>,
{
    get_user_where(db, "id", id).await
}

pub async fn get_user_by_email<'e, E>(db: E, email: &str) -> Result<User, DbError>
where
    E: SqliteExecutor<'e>,
{
    get_user_where(db, "email", email).await
}

pub async fn get_user_by_username<'e, E>(db: E, username: &str) -> Result<User, DbError>
where
    E: SqliteExecutor<'e>,
{
    get_user_where(db, "username", username).await
}

/// Whether a live user other than `except_id` already holds `value` in `column`.
async fn user_value_taken(
    db: &DbContext,
    column: &'static str,
    value: &str,
    except_id: Option<&str>,
) -> Result<bool, DbError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM users WHERE {column} = ? AND {} AND id != ?)",
        live_rows(SoftDelete::Status, "")
    );
    let taken: bool = sqlx::query_scalar(&sql)
        .bind(value)
        .bind(except_id.unwrap_or_default())
        .fetch_one(db)
        .await?;
    Ok(taken)
}

pub async fn email_taken(db: &DbContext, email: &str, except_id: Option<&str>) -> Result<bool, DbError> {
    user_value_taken(db, "email", email, except_id).await
}

pub async fn username_taken(db: &DbContext, username: &str, except_id: Option<&str>) -> Result<bool, DbError> {
    user_value_taken(db, "username", username, except_id).await
}

pub async fn list_users(
    db: &DbContext,
    filter: &UserFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<User>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::Status, ""))
        .eq("organization_id", filter.organization_id)
        .eq("role_id", filter.role_id)
        .eq("status", filter.status)
        .search(&["name", "username", "email"], filter.search);

    let statement = ListStatement {
        select: USER_COLUMNS,
        ..ListStatement::table("users")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn update_user(db: &DbContext, id: &str, changes: &UserChanges) -> Result<User, DbError> {
    let sql = format!(
        "UPDATE users SET organization_id = ?, role_id = ?, name = ?, username = ?, email = ?, employee_id = ?, \
         position = ?, address = ?, phone = ?, thumbnail = ?, bio = ?, updated_at = ? \
         WHERE id = ? AND {} RETURNING {USER_COLUMNS}",
        live_rows(SoftDelete::Status, "")
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(&changes.organization_id)
        .bind(&changes.role_id)
        .bind(&changes.name)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.employee_id)
        .bind(&changes.position)
        .bind(&changes.address)
        .bind(&changes.phone)
        .bind(&changes.thumbnail)
        .bind(&changes.bio)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn update_user_status(db: &DbContext, id: &str, status: &str) -> Result<(), DbError> {
    let sql = format!(
        "UPDATE users SET status = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::Status, "")
    );
    let result = sqlx::query(&sql)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    affected(result.rows_affected())
}

/// Soft delete; the partial unique indexes release the email and username.
pub async fn delete_user(db: &DbContext, id: &str) -> Result<(), DbError> {
    update_user_status(db, id, "deleted").await
}
