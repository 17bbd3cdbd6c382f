use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, affected, fetch_page,
    live_rows,
};

pub const INTEGRATION_SORT_COLUMNS: &[&str] = &["name", "type", "status", "created_at", "updated_at"];
pub const INTEGRATION_STATUSES: &[&str] = &["active", "inactive", "error"];

const INTEGRATION_COLUMNS: &str = "id, name, type, description, config, endpoint, api_key, status, last_sync_at, \
     organization_id, created_by, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Integration {
    pub id: String,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    pub config: Json<serde_json::Value>,
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub status: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub organization_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct IntegrationFields {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub config: serde_json::Value,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct IntegrationFilter<'a> {
    pub organization_id: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub status: Option<&'a str>,
    pub search: Option<&'a str>,
}

pub async fn list_integrations(
    db: &DbContext,
    filter: &IntegrationFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Integration>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .eq("organization_id", filter.organization_id)
        .eq("type", filter.kind)
        .eq("status", filter.status)
        .search(&["name", "description"], filter.search);

    let statement = ListStatement {
        select: INTEGRATION_COLUMNS,
        ..ListStatement::table("integrations")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn get_integration(db: &DbContext, id: &str) -> Result<Integration, DbError> {
    let sql = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Integration>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_integration(
    db: &DbContext,
    fields: &IntegrationFields,
    created_by: &str,
) -> Result<Integration, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO integrations (id, name, type, description, config, endpoint, api_key, status, organization_id, \
         created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, ?) \
         RETURNING {INTEGRATION_COLUMNS}"
    );
    let integration = sqlx::query_as::<_, Integration>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&fields.name)
        .bind(&fields.kind)
        .bind(&fields.description)
        .bind(Json(&fields.config))
        .bind(&fields.endpoint)
        .bind(&fields.api_key)
        .bind(&fields.organization_id)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(integration)
}

/// Replaces the integration settings; an absent `api_key` keeps the stored one.
pub async fn update_integration(db: &DbContext, id: &str, fields: &IntegrationFields) -> Result<Integration, DbError> {
    let sql = format!(
        "UPDATE integrations SET name = ?, type = ?, description = ?, config = ?, endpoint = ?, \
         api_key = COALESCE(?, api_key), organization_id = ?, updated_at = ? \
         WHERE id = ? AND {} RETURNING {INTEGRATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Integration>(&sql)
        .bind(&fields.name)
        .bind(&fields.kind)
        .bind(&fields.description)
        .bind(Json(&fields.config))
        .bind(&fields.endpoint)
        .bind(&fields.api_key)
        .bind(&fields.organization_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn update_integration_status(db: &DbContext, id: &str, status: &str) -> Result<Integration, DbError> {
    let sql = format!(
        "UPDATE integrations SET status = ?, updated_at = ? WHERE id = ? AND {} RETURNING {INTEGRATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Integration>(&sql)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_integration(db: &DbContext, id: &str) -> Result<(), DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE integrations SET deleted_at = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(now).bind(now).bind(id).execute(db).await?;
    affected(result.rows_affected())
}
