use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SoftDelete, SortSpec, SqlFilter, affected, fetch_page,
    live_rows,
};

pub const PUBLICATION_SORT_COLUMNS: &[&str] = &[
    "title",
    "published_date",
    "view_count",
    "download_count",
    "created_at",
    "updated_at",
];
pub const PUBLICATION_STATUSES: &[&str] = &["draft", "published", "archived"];

const PUBLICATION_COLUMNS: &str = "id, title, description, content, doi, publisher, published_date, dataset_id, \
     organization_id, authors, tags, status, is_featured, view_count, download_count, created_by, updated_by, \
     created_at, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Publication {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub doi: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
    pub status: String,
    pub is_featured: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PublicationFields {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub doi: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub dataset_id: Option<String>,
    pub organization_id: Option<String>,
    pub authors: Option<String>,
    pub tags: Option<String>,
    pub status: String,
    pub is_featured: bool,
}

#[derive(Debug, Default)]
pub struct PublicationFilter<'a> {
    pub dataset_id: Option<&'a str>,
    pub organization_id: Option<&'a str>,
    pub status: Option<&'a str>,
    pub is_featured: Option<bool>,
    pub search: Option<&'a str>,
}

pub async fn list_publications(
    db: &DbContext,
    filter: &PublicationFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Publication>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .raw(live_rows(SoftDelete::DeletedAt, ""))
        .eq("dataset_id", filter.dataset_id)
        .eq("organization_id", filter.organization_id)
        .eq("status", filter.status)
        .flag("is_featured", filter.is_featured)
        .search(&["title", "description"], filter.search);

    let statement = ListStatement {
        select: PUBLICATION_COLUMNS,
        ..ListStatement::table("publications")
    };
    fetch_page(db, statement, &conditions, sort, page).await
}

pub async fn get_publication(db: &DbContext, id: &str) -> Result<Publication, DbError> {
    let sql = format!(
        "SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Publication>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

/// Reads a publication, counting the view in the same statement.
pub async fn view_publication(db: &DbContext, id: &str) -> Result<Publication, DbError> {
    let sql = format!(
        "UPDATE publications SET view_count = view_count + 1 WHERE id = ? AND {} RETURNING {PUBLICATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Publication>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn record_publication_download(db: &DbContext, id: &str) -> Result<Publication, DbError> {
    let sql = format!(
        "UPDATE publications SET download_count = download_count + 1 WHERE id = ? AND {} \
         RETURNING {PUBLICATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Publication>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_publication(
    db: &DbContext,
    fields: &PublicationFields,
    created_by: &str,
) -> Result<Publication, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO publications (id, title, description, content, doi, publisher, published_date, dataset_id, \
         organization_id, authors, tags, status, is_featured, view_count, download_count, created_by, updated_by, \
         created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?) RETURNING {PUBLICATION_COLUMNS}"
    );
    let publication = sqlx::query_as::<_, Publication>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.content)
        .bind(&fields.doi)
        .bind(&fields.publisher)
        .bind(&fields.published_date)
        .bind(&fields.dataset_id)
        .bind(&fields.organization_id)
        .bind(&fields.authors)
        .bind(&fields.tags)
        .bind(&fields.status)
        .bind(fields.is_featured)
        .bind(created_by)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(publication)
}

pub async fn update_publication(
    db: &DbContext,
    id: &str,
    fields: &PublicationFields,
    updated_by: &str,
) -> Result<Publication, DbError> {
    let sql = format!(
        "UPDATE publications SET title = ?, description = ?, content = ?, doi = ?, publisher = ?, \
         published_date = ?, dataset_id = ?, organization_id = ?, authors = ?, tags = ?, status = ?, \
         is_featured = ?, updated_by = ?, updated_at = ? WHERE id = ? AND {} RETURNING {PUBLICATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Publication>(&sql)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.content)
        .bind(&fields.doi)
        .bind(&fields.publisher)
        .bind(&fields.published_date)
        .bind(&fields.dataset_id)
        .bind(&fields.organization_id)
        .bind(&fields.authors)
        .bind(&fields.tags)
        .bind(&fields.status)
        .bind(fields.is_featured)
        .bind(updated_by)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn update_publication_status(
    db: &DbContext,
    id: &str,
    status: &str,
    updated_by: &str,
) -> Result<Publication, DbError> {
    let sql = format!(
        "UPDATE publications SET status = ?, updated_by = ?, updated_at = ? WHERE id = ? AND {} \
         RETURNING {PUBLICATION_COLUMNS}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    sqlx::query_as::<_, Publication>(&sql)
        .bind(status)
        .bind(updated_by)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_publication(db: &DbContext, id: &str) -> Result<(), DbError> {
    let now = Utc::now();
    let sql = format!(
        "UPDATE publications SET deleted_at = ?, updated_at = ? WHERE id = ? AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let result = sqlx::query(&sql).bind(now).bind(now).bind(id).execute(db).await?;
    affected(result.rows_affected())
}
