use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, SqlValue, affected,
    fetch_page, live_rows,
};

pub const SETTING_SORT_COLUMNS: &[&str] = &["key", "category", "created_at", "updated_at"];
pub const SETTING_TYPES: &[&str] = &["string", "number", "boolean", "json"];

const SETTING_COLUMNS: &str = "id, key, value, type, category, user_id, is_public, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Setting {
    pub id: String,
    pub key: String,
    pub value: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub user_id: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SettingFields {
    pub key: String,
    pub value: String,
    pub kind: String,
    pub category: String,
    pub user_id: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Default)]
pub struct SettingFilter<'a> {
    pub category: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub search: Option<&'a str>,
}

pub async fn list_settings(
    db: &DbContext,
    filter: &SettingFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Setting>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .eq("category", filter.category)
        .eq("user_id", filter.user_id)
        .eq("type", filter.kind)
        .search(&["key", "value"], filter.search);

    let statement = ListStatement {
        select: SETTING_COLUMNS,
        ..ListStatement::table("settings")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

async fn get_setting_where(db: &DbContext, column: &'static str, value: &str) -> Result<Setting, DbError> {
    let sql = format!(
        "SELECT {SETTING_COLUMNS} FROM settings WHERE {column} = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Setting>(&sql)
        .bind(value)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn get_setting(db: &DbContext, id: &str) -> Result<Setting, DbError> {
    get_setting_where(db, "id", id).await
}

pub async fn get_setting_by_key(db: &DbContext, key: &str) -> Result<Setting, DbError> {
    get_setting_where(db, "key", key).await
}

pub async fn list_settings_by_category(db: &DbContext, category: &str) -> Result<Vec<Setting>, DbError> {
    let sql = format!(
        "SELECT {SETTING_COLUMNS} FROM settings WHERE category = ? AND {} ORDER BY key ASC",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let settings = sqlx::query_as::<_, Setting>(&sql).bind(category).fetch_all(db).await?;
    Ok(settings)
}

/// Values of the requested keys; keys with no live setting are absent from the map.
pub async fn get_setting_values(db: &DbContext, keys: &[String]) -> Result<BTreeMap<String, String>, DbError> {
    if keys.is_empty() {
        return Ok(BTreeMap::new());
    }
    let placeholders = vec!["?"; keys.len()].join(", ");
    let mut filter = SqlFilter::new();
    filter
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .with(
            format!("key IN ({placeholders})"),
            keys.iter().map(|key| SqlValue::from(key.as_str())),
        );

    let sql = format!("SELECT key, value FROM settings{}", filter.where_clause());
    let pairs: Vec<(String, String)> = sqlx::query_as_with(&sql, filter.arguments(&[])?)
        .fetch_all(db)
        .await?;
    Ok(pairs.into_iter().collect())
}

pub async fn create_setting(db: &DbContext, fields: &SettingFields) -> Result<Setting, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO settings (id, key, value, type, category, user_id, is_public, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {SETTING_COLUMNS}"
    );
    let setting = sqlx::query_as::<_, Setting>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&fields.key)
        .bind(&fields.value)
        .bind(&fields.kind)
        .bind(&fields.category)
        .bind(&fields.user_id)
        .bind(fields.is_public)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(setting)
}

pub async fn update_setting(db: &DbContext, id: &str, fields: &SettingFields) -> Result<Setting, DbError> {
    let sql = format!(
        "UPDATE settings SET key = ?, value = ?, type = ?, category = ?, user_id = ?, is_public = ?, updated_at = ? \
         WHERE id = ? AND {} RETURNING {SETTING_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Setting>(&sql)
        .bind(&fields.key)
        .bind(&fields.value)
        .bind(&fields.kind)
        .bind(&fields.category)
        .bind(&fields.user_id)
        .bind(fields.is_public)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_setting(db: &DbContext, id: &str) -> Result<(), DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE settings SET deleted_at = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(now).bind(now).bind(id).execute(db).await?;
    affected(result.rows_affected())
}
