use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, affected, fetch_page,
    live_rows,
};

pub const VISUALIZATION_SORT_COLUMNS: &[&str] = &["title", "type", "created_at", "updated_at"];
pub const VISUALIZATION_STATUSES: &[&str] = &["draft", "published", "archived"];

const VISUALIZATION_COLUMNS: &str = "id, title, description, type, config, dataset_id, organization_id, topic_id, \
     is_highlight, status, created_by, updated_by, created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Visualization {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub config: Json<serde_json::Value>,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub topic_id: Option<String>,
    pub is_highlight: bool,
    pub status: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct VisualizationFields {
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub config: serde_json::Value,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub topic_id: Option<String>,
    pub is_highlight: bool,
    pub status: String,
}

#[derive(Debug, Default)]
pub struct VisualizationFilter<'a> {
    pub dataset_id: Option<&'a str>,
    pub organization_id: Option<&'a str>,
    pub topic_id: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub status: Option<&'a str>,
    pub is_highlight: Option<bool>,
    pub search: Option<&'a str>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct TypeCount {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct VisualizationStats {
    pub total: i64,
    pub published: i64,
    pub draft: i64,
    pub highlighted: i64,
    pub by_type: Vec<TypeCount>,
}

pub async fn list_visualizations(
    db: &DbContext,
    filter: &VisualizationFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Visualization>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .eq("dataset_id", filter.dataset_id)
        .eq("organization_id", filter.organization_id)
        .eq("topic_id", filter.topic_id)
        .eq("type", filter.kind)
        .eq("status", filter.status)
        .flag("is_highlight", filter.is_highlight)
        .search(&["title", "description"], filter.search);

    let statement = ListStatement {
        select: VISUALIZATION_COLUMNS,
        ..ListStatement::table("visualizations")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn get_visualization(db: &DbContext, id: &str) -> Result<Visualization, DbError> {
    let sql = format!(
        "SELECT {VISUALIZATION_COLUMNS} FROM visualizations WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Visualization>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_visualization(
    db: &DbContext,
    fields: &VisualizationFields,
    created_by: &str,
) -> Result<Visualization, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO visualizations (id, title, description, type, config, dataset_id, organization_id, topic_id, \
         is_highlight, status, created_by, updated_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {VISUALIZATION_COLUMNS}"
    );
    let visualization = sqlx::query_as::<_, Visualization>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.kind)
        .bind(Json(&fields.config))
        .bind(&fields.dataset_id)
        .bind(&fields.organization_id)
        .bind(&fields.topic_id)
        .bind(fields.is_highlight)
        .bind(&fields.status)
        .bind(created_by)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(visualization)
}

pub async fn update_visualization(
    db: &DbContext,
    id: &str,
    fields: &VisualizationFields,
    updated_by: &str,
) -> Result<Visualization, DbError> {
    let sql = format!(
        "UPDATE visualizations SET title = ?, description = ?, type = ?, config = ?, dataset_id = ?, \
         organization_id = ?, topic_id = ?, is_highlight = ?, status = ?, updated_by = ?, updated_at = ? \
         WHERE id = ? AND {} RETURNING {VISUALIZATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Visualization>(&sql)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.kind)
        .bind(Json(&fields.config))
        .bind(&fields.dataset_id)
        .bind(&fields.organization_id)
        .bind(&fields.topic_id)
        .bind(fields.is_highlight)
        .bind(&fields.status)
        .bind(updated_by)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_visualization(db: &DbContext, id: &str) -> Result<(), DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE visualizations SET deleted_at = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(now).bind(now).bind(id).execute(db).await?;
    affected(result.rows_affected())
}

pub async fn visualization_stats(db: &DbContext) -> Result<VisualizationStats, DbError> {
    let live = live_rows(SoftDelete::DeletedAt, "");
    let totals_sql = format!(
        "SELECT COUNT(*), \
         COALESCE(SUM(status = 'published'), 0), \
         COALESCE(SUM(status = 'draft'), 0), \
         COALESCE(SUM(is_highlight), 0) \
         FROM visualizations WHERE {live}"
    );
    let (total, published, draft, highlighted): (i64, i64, i64, i64) =
        sqlx::query_as(&totals_sql).fetch_one(db).await?;

    let by_type_sql = format!(
        "SELECT type, COUNT(*) AS count FROM visualizations WHERE {live} GROUP BY type ORDER BY count DESC, type ASC"
    );
    let by_type = sqlx::query_as::<_, TypeCount>(&by_type_sql).fetch_all(db).await?;

    Ok(VisualizationStats {
        total,
        published,
        draft,
        highlighted,
        by_type,
    })
}
