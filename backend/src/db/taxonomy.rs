use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{DbContext, DbError, ListStatement, Page, PageRequest, SortSpec, SqlFilter, affected, fetch_page};

pub const TERM_SORT_COLUMNS: &[&str] = &["name", "created_at"];
pub const UNIT_SORT_COLUMNS: &[&str] = &["name", "symbol", "created_at"];

/// The named lookup tables sharing the `{id, name, slug, created_at}` shape.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Taxonomy {
    Tag,
    Topic,
    BusinessField,
}

impl Taxonomy {
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Topic => "topics",
            Self::BusinessField => "business_fields",
        }
    }

    /// Display name used in response messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tag => "Tag",
            Self::Topic => "Topic",
            Self::BusinessField => "Business field",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, FromRow, PartialEq, Serialize)]
pub struct Term {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Eq, FromRow, PartialEq, Serialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
}

pub async fn list_terms(
    db: &DbContext,
    taxonomy: Taxonomy,
    search: Option<&str>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Term>, DbError> {
    let mut filter = SqlFilter::new();
    filter.search(&["name", "slug"], search);

    let statement = ListStatement {
        select: "id, name, slug, created_at",
        ..ListStatement::table(taxonomy.table())
    };
    fetch_page(db, statement, &filter, sort, page).await
}

pub async fn get_term(db: &DbContext, taxonomy: Taxonomy, id: &str) -> Result<Term, DbError> {
    let sql = format!("SELECT id, name, slug, created_at FROM {} WHERE id = ?", taxonomy.table());
    sqlx::query_as::<_, Term>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_term(db: &DbContext, taxonomy: Taxonomy, name: &str, slug: &str) -> Result<Term, DbError> {
    let sql = format!(
        "INSERT INTO {} (id, name, slug, created_at) VALUES (?, ?, ?, ?) RETURNING id, name, slug, created_at",
        taxonomy.table()
    );
    let term = sqlx::query_as::<_, Term>(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(slug)
        .bind(Utc::now())
        .fetch_one(db)
        .await?;
    Ok(term)
}

pub async fn update_term(db: &DbContext, taxonomy: Taxonomy, id: &str, name: &str, slug: &str) -> Result<Term, DbError> {
    let sql = format!(
        "UPDATE {} SET name = ?, slug = ? WHERE id = ? RETURNING id, name, slug, created_at",
        taxonomy.table()
    );
    sqlx::query_as::<_, Term>(&sql)
        .bind(name)
        .bind(slug)
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn delete_term(db: &DbContext, taxonomy: Taxonomy, id: &str) -> Result<(), DbError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", taxonomy.table());
    let result = sqlx::query(&sql).bind(id).execute(db).await?;
    affected(result.rows_affected())
}

pub async fn list_units(
    db: &DbContext,
    search: Option<&str>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Unit>, DbError> {
    let mut filter = SqlFilter::new();
    filter.search(&["name", "symbol"], search);

    let statement = ListStatement {
        select: "id, name, symbol, created_at",
        ..ListStatement::table("units")
    };
    fetch_page(db, statement, &filter, sort, page).await
}

pub async fn get_unit(db: &DbContext, id: &str) -> Result<Unit, DbError> {
    sqlx::query_as::<_, Unit>("SELECT id, name, symbol, created_at FROM units WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

pub async fn create_unit(db: &DbContext, name: &str, symbol: &str) -> Result<Unit, DbError> {
    let unit = sqlx::query_as::<_, Unit>(
        "INSERT INTO units (id, name, symbol, created_at) VALUES (?, ?, ?, ?) RETURNING id, name, symbol, created_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(symbol)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(unit)
}

pub async fn update_unit(db: &DbContext, id: &str, name: &str, symbol: &str) -> Result<Unit, DbError> {
    sqlx::query_as::<_, Unit>(
        "UPDATE units SET name = ?, symbol = ? WHERE id = ? RETURNING id, name, symbol, created_at",
    )
    .bind(name)
    .bind(symbol)
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(DbError::RowNotFound)
}

pub async fn delete_unit(db: &DbContext, id: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM units WHERE id = ?").bind(id).execute(db).await?;
    affected(result.rows_affected())
}
