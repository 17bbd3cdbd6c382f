use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};
use uuid::Uuid;

use crate::core::{DbContext, DbError, ListStatement, Page, PageRequest, SortSpec, SqlFilter, affected, fetch_page};

pub const ORGANIZATION_SORT_COLUMNS: &[&str] = &["name", "code", "status", "created_at", "updated_at"];

const ORGANIZATION_COLUMNS: &str = "id, code, name, slug, description, logo_url, phone_number, address, \
     website_url, email, total_datasets, public_datasets, total_mapsets, public_mapsets, status, \
     created_by, created_at, updated_by, updated_at";

#[derive(Clone, Debug, FromRow, Serialize)]
pub struct Organization {
    pub id: String,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub email: Option<String>,
    pub total_datasets: i64,
    pub public_datasets: i64,
    pub total_mapsets: i64,
    pub public_mapsets: i64,
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Writable columns shared by create and update.
#[derive(Debug, Default)]
pub struct OrganizationFields {
    pub code: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub email: Option<String>,
    pub status: String,
}

/// Running counters kept on each organization.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrganizationCounter {
    TotalDatasets,
    PublicDatasets,
    TotalMapsets,
    PublicMapsets,
}

impl OrganizationCounter {
    const fn column(self) -> &'static str {
        match self {
            Self::TotalDatasets => "total_datasets",
            Self::PublicDatasets => "public_datasets",
            Self::TotalMapsets => "total_mapsets",
            Self::PublicMapsets => "public_mapsets",
        }
    }
}

pub async fn list_organizations(
    db: &DbContext,
    status: Option<&str>,
    search: Option<&str>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Organization>, DbError> {
    let mut filter = SqlFilter::new();
    filter.eq("status", status).search(&["name", "code"], search);

    let statement = ListStatement {
        select: ORGANIZATION_COLUMNS,
        ..ListStatement::table("organizations")
    };
    fetch_page(db, statement, &filter, sort, page).await
}

async fn get_organization_where(db: &DbContext, column: &'static str, value: &str) -> Result<Organization, DbError> {
    let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE {column} = ?");
    sqlx::query_as::<_, Organization>(&sql)
        .bind(value)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn get_organization_by_id(db: &DbContext, id: &str) -> Result<Organization, DbError> {
    get_organization_where(db, "id", id).await
}

pub async fn get_organization_by_code(db: &DbContext, code: &str) -> Result<Organization, DbError> {
    get_organization_where(db, "code", &code.to_uppercase()).await
}

pub async fn get_organization_by_slug(db: &DbContext, slug: &str) -> Result<Organization, DbError> {
    get_organization_where(db, "slug", slug).await
}

pub async fn create_organization(
    db: &DbContext,
    fields: &OrganizationFields,
    created_by: &str,
) -> Result<Organization, DbError> {
    let now = Utc::now();
    let sql = format!(
        "INSERT INTO organizations (id, code, name, slug, description, logo_url, phone_number, address, \
         website_url, email, status, created_by, created_at, updated_by, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {ORGANIZATION_COLUMNS}"
    );
    let organization = sqlx::query_as::<_, Organization>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(fields.code.to_uppercase())
        .bind(&fields.name)
        .bind(&fields.slug)
        .bind(&fields.description)
        .bind(&fields.logo_url)
        .bind(&fields.phone_number)
        .bind(&fields.address)
        .bind(&fields.website_url)
        .bind(&fields.email)
        .bind(&fields.status)
        .bind(created_by)
        .bind(now)
        .bind(created_by)
        .bind(now)
        .fetch_one(db)
        .await?;
    Ok(organization)
}

pub async fn update_organization(
    db: &DbContext,
    id: &str,
    fields: &OrganizationFields,
    updated_by: &str,
) -> Result<Organization, DbError> {
    let sql = format!(
        "UPDATE organizations SET code = ?, name = ?, slug = ?, description = ?, logo_url = ?, phone_number = ?, \
         address = ?, website_url = ?, email = ?, status = ?, updated_by = ?, updated_at = ? \
         WHERE id = ? RETURNING {ORGANIZATION_COLUMNS}"
    );
    sqlx::query_as::<_, Organization>(&sql)
        .bind(fields.code.to_uppercase())
        .bind(&fields.name)
        .bind(&fields.slug)
        .bind(&fields.description)
        .bind(&fields.logo_url)
        .bind(&fields.phone_number)
        .bind(&fields.address)
        .bind(&fields.website_url)
        .bind(&fields.email)
        .bind(&fields.status)
        .bind(updated_by)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_organization(db: &DbContext, id: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    affected(result.rows_affected())
}

pub async fn increment_organization_counter<'e, E>(
    db: E,
    id: &str,
    counter: OrganizationCounter,
) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    let column = counter.column();
    let sql = format!("UPDATE organizations SET {column} = {column} + 1, updated_at = ? WHERE id = ?");
    let result = sqlx::query(&sql).bind(Utc::now()).bind(id).execute(db).await?;
    Ok(result.rows_affected() > 0)
}

/// Decrements and clamps at zero. Returns false when the organization does not exist.
pub async fn decrement_organization_counter<'e, E>(
    db: E,
    id: &str,
    counter: OrganizationCounter,
) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    let column = counter.column();
    let sql = format!("UPDATE organizations SET {column} = MAX({column} - 1, 0), updated_at = ? WHERE id = ?");
    let result = sqlx::query(&sql).bind(Utc::now()).bind(id).execute(db).await?;
    Ok(result.rows_affected() > 0)
}
