use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::{FromRow, SqliteExecutor};

use crate::core::{
    DbContext, DbError, ListStatement, Page, PageRequest, SortSpec, SqlFilter, SqlValue, affected, fetch_page,
};
use crate::db::{Term, Unit};

pub const DATASET_SORT_COLUMNS: &[&str] = &["name", "created_at", "updated_at", "category", "classification"];
pub const DATASET_STATUSES: &[&str] = &["draft", "published", "archived"];
pub const VALIDATION_STATUSES: &[&str] = &["valid", "invalid", "pending"];

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PUBLISHED: &str = "published";
pub const STATUS_ARCHIVED: &str = "archived";

/// Dataset columns plus the flattened left joins; every joined column may be null.
const DATASET_SELECT: &str = "d.id, d.name, d.slug, d.description, d.organization_id, d.classification, \
     d.category, d.period, d.unit_id, d.business_field_id, d.topic_id, d.reference_id, d.image, d.metadatas, \
     d.validation_status, d.status, d.is_highlight, d.data_fixed, d.created_by, d.updated_by, d.created_at, \
     d.updated_at, \
     o.name AS organization_name, o.slug AS organization_slug, \
     u.name AS unit_name, u.symbol AS unit_symbol, u.created_at AS unit_created_at, \
     bf.name AS business_field_name, bf.slug AS business_field_slug, bf.created_at AS business_field_created_at, \
     t.name AS topic_name, t.slug AS topic_slug, t.created_at AS topic_created_at";

const DATASET_FROM: &str = "datasets d \
     LEFT JOIN organizations o ON o.id = d.organization_id \
     LEFT JOIN units u ON u.id = d.unit_id \
     LEFT JOIN business_fields bf ON bf.id = d.business_field_id \
     LEFT JOIN topics t ON t.id = d.topic_id";

#[derive(Debug, FromRow)]
struct DatasetRow {
    id: String,
    name: String,
    slug: String,
    description: Option<String>,
    organization_id: String,
    classification: String,
    category: String,
    period: Option<String>,
    unit_id: Option<String>,
    business_field_id: Option<String>,
    topic_id: Option<String>,
    reference_id: Option<String>,
    image: Option<String>,
    metadatas: Option<String>,
    validation_status: String,
    status: String,
    is_highlight: bool,
    data_fixed: bool,
    created_by: String,
    updated_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    organization_name: Option<String>,
    organization_slug: Option<String>,
    unit_name: Option<String>,
    unit_symbol: Option<String>,
    unit_created_at: Option<DateTime<Utc>>,
    business_field_name: Option<String>,
    business_field_slug: Option<String>,
    business_field_created_at: Option<DateTime<Utc>>,
    topic_name: Option<String>,
    topic_slug: Option<String>,
    topic_created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OrganizationRef {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// The dataset aggregate: the row, its single-valued relations and its tag set.
#[derive(Clone, Debug, Serialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub organization_id: String,
    pub classification: String,
    pub category: String,
    pub period: Option<String>,
    pub unit_id: Option<String>,
    pub business_field_id: Option<String>,
    pub topic_id: Option<String>,
    pub reference_id: Option<String>,
    pub image: Option<String>,
    pub metadatas: Option<serde_json::Value>,
    pub validation_status: String,
    pub status: String,
    pub is_highlight: bool,
    pub data_fixed: bool,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_field: Option<Term>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<Term>,
    pub tags: Vec<Term>,
}

fn joined_term(id: Option<&String>, name: Option<String>, slug: Option<String>, at: Option<DateTime<Utc>>) -> Option<Term> {
    match (id, name, slug, at) {
        (Some(id), Some(name), Some(slug), Some(created_at)) => Some(Term {
            id: id.clone(),
            name,
            slug,
            created_at,
        }),
        _ => None,
    }
}

impl From<DatasetRow> for Dataset {
    fn from(row: DatasetRow) -> Self {
        let organization = match (row.organization_name, row.organization_slug) {
            (Some(name), Some(slug)) => Some(OrganizationRef {
                id: row.organization_id.clone(),
                name,
                slug,
            }),
            _ => None,
        };
        let unit = match (row.unit_id.as_ref(), row.unit_name, row.unit_symbol, row.unit_created_at) {
            (Some(id), Some(name), Some(symbol), Some(created_at)) => Some(Unit {
                id: id.clone(),
                name,
                symbol,
                created_at,
            }),
            _ => None,
        };
        let business_field = joined_term(
            row.business_field_id.as_ref(),
            row.business_field_name,
            row.business_field_slug,
            row.business_field_created_at,
        );
        let topic = joined_term(row.topic_id.as_ref(), row.topic_name, row.topic_slug, row.topic_created_at);
        let metadatas = row
            .metadatas
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok());

        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            organization_id: row.organization_id,
            classification: row.classification,
            category: row.category,
            period: row.period,
            unit_id: row.unit_id,
            business_field_id: row.business_field_id,
            topic_id: row.topic_id,
            reference_id: row.reference_id,
            image: row.image,
            metadatas,
            validation_status: row.validation_status,
            status: row.status,
            is_highlight: row.is_highlight,
            data_fixed: row.data_fixed,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            organization,
            unit,
            business_field,
            topic,
            tags: Vec::new(),
        }
    }
}

/// Scalar columns written by create and update.
#[derive(Clone, Debug, Default)]
pub struct DatasetFields {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub classification: String,
    pub category: String,
    pub period: Option<String>,
    pub unit_id: Option<String>,
    pub business_field_id: Option<String>,
    pub topic_id: Option<String>,
    pub reference_id: Option<String>,
    pub image: Option<String>,
    pub metadatas: Option<String>,
    pub validation_status: String,
    pub is_highlight: bool,
    pub data_fixed: bool,
}

#[derive(Debug)]
pub struct NewDataset<'a> {
    pub id: &'a str,
    pub organization_id: &'a str,
    pub created_by: &'a str,
    pub status: &'a str,
    pub fields: &'a DatasetFields,
}

#[derive(Debug, Default)]
pub struct DatasetFilter<'a> {
    pub organization_id: Option<&'a str>,
    pub topic_id: Option<&'a str>,
    pub business_field_id: Option<&'a str>,
    pub tag_id: Option<&'a str>,
    pub status: Option<&'a str>,
    pub validation_status: Option<&'a str>,
    pub classification: Option<&'a str>,
    pub search: Option<&'a str>,
}

/// Lifecycle columns read before a status change.
#[derive(Clone, Debug, FromRow)]
pub struct DatasetState {
    pub organization_id: String,
    pub status: String,
}

pub async fn list_datasets(
    db: &DbContext,
    filter: &DatasetFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Dataset>, DbError> {
    let mut conditions = SqlFilter::new();
    conditions
        .eq("d.organization_id", filter.organization_id)
        .eq("d.topic_id", filter.topic_id)
        .eq("d.business_field_id", filter.business_field_id)
        .eq("d.status", filter.status)
        .eq("d.validation_status", filter.validation_status)
        .eq("d.classification", filter.classification)
        .search(&["d.name", "d.description"], filter.search);
    if let Some(tag_id) = crate::core::non_empty(filter.tag_id) {
        conditions.with(
            "EXISTS (SELECT 1 FROM dataset_tags dt WHERE dt.dataset_id = d.id AND dt.tag_id = ?)",
            [SqlValue::from(tag_id)],
        );
    }

    let statement = ListStatement {
        select: DATASET_SELECT,
        from: DATASET_FROM,
        count_from: "datasets d",
        alias: "d",
    };
    let page = fetch_page::<DatasetRow>(db, statement, &conditions, sort, page).await?;
    let ids: Vec<String> = page.rows.iter().map(|row| row.id.clone()).collect();
    let mut tags = load_tags_for(db, &ids).await?;

    Ok(page.map(|row| {
        let mut dataset = Dataset::from(row);
        dataset.tags = tags.remove(&dataset.id).unwrap_or_default();
        dataset
    }))
}

async fn get_dataset_where(db: &DbContext, column: &'static str, value: &str) -> Result<Dataset, DbError> {
    let sql = format!("SELECT {DATASET_SELECT} FROM {DATASET_FROM} WHERE {column} = ?");
    let row = sqlx::query_as::<_, DatasetRow>(&sql)
        .bind(value)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)?;

    let mut dataset = Dataset::from(row);
    dataset.tags = get_dataset_tags(db, &dataset.id).await?;
    Ok(dataset)
}

pub async fn get_dataset_by_id(db: &DbContext, id: &str) -> Result<Dataset, DbError> {
    get_dataset_where(db, "d.id", id).await
}

pub async fn get_dataset_by_slug(db: &DbContext, slug: &str) -> Result<Dataset, DbError> {
    get_dataset_where(db, "d.slug", slug).await
}

pub async fn get_dataset_tags<'e, E>(db: E, dataset_id: &str) -> Result<Vec<Term>, DbError>
where
    E: SqliteExecutor<'e>,
{
    let tags = sqlx::query_as::<_, Term>(
        r"
        SELECT t.id, t.name, t.slug, t.created_at
        FROM tags t
        JOIN dataset_tags dt ON dt.tag_id = t.id
        WHERE dt.dataset_id = ?
        ORDER BY t.name ASC
        ",
    )
    .bind(dataset_id)
    .fetch_all(db)
    .await?;
    Ok(tags)
}

#[derive(FromRow)]
struct LinkedTag {
    dataset_id: String,
    #[sqlx(flatten)]
    tag: Term,
}

/// Tag sets of several datasets in one query, keyed by dataset id.
async fn load_tags_for(db: &DbContext, dataset_ids: &[String]) -> Result<HashMap<String, Vec<Term>>, DbError> {
    let mut tags: HashMap<String, Vec<Term>> = HashMap::new();
    if dataset_ids.is_empty() {
        return Ok(tags);
    }

    let placeholders = vec!["?"; dataset_ids.len()].join(", ");
    let sql = format!(
        "SELECT dt.dataset_id, t.id, t.name, t.slug, t.created_at \
         FROM dataset_tags dt JOIN tags t ON t.id = dt.tag_id \
         WHERE dt.dataset_id IN ({placeholders}) ORDER BY t.name ASC"
    );
    let mut query = sqlx::query_as::<_, LinkedTag>(&sql);
    for id in dataset_ids {
        query = query.bind(id);
    }
    for linked in query.fetch_all(db).await? {
        tags.entry(linked.dataset_id).or_default().push(linked.tag);
    }
    Ok(tags)
}

/// True when a dataset other than `except_id` already uses the slug.
pub async fn dataset_slug_taken<'e, E>(db: E, slug: &str, except_id: Option<&str>) -> Result<bool, DbError>
where
    E: SqliteExecutor<'e>,
{
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM datasets WHERE slug = ? AND id != ?)")
        .bind(slug)
        .bind(except_id.unwrap_or_default())
        .fetch_one(db)
        .await?;
    Ok(taken)
}

pub async fn insert_dataset<'e, E>(db: E, dataset: &NewDataset<'_>) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let fields = dataset.fields;
    sqlx::query(
        r"
        INSERT INTO datasets (id, name, slug, description, organization_id, classification, category, period,
            unit_id, business_field_id, topic_id, reference_id, image, metadatas, validation_status, status,
            is_highlight, data_fixed, created_by, updated_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(dataset.id)
    .bind(&fields.name)
    .bind(&fields.slug)
    .bind(&fields.description)
    .bind(dataset.organization_id)
    .bind(&fields.classification)
    .bind(&fields.category)
    .bind(&fields.period)
    .bind(&fields.unit_id)
    .bind(&fields.business_field_id)
    .bind(&fields.topic_id)
    .bind(&fields.reference_id)
    .bind(&fields.image)
    .bind(&fields.metadatas)
    .bind(&fields.validation_status)
    .bind(dataset.status)
    .bind(fields.is_highlight)
    .bind(fields.data_fixed)
    .bind(dataset.created_by)
    .bind(dataset.created_by)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Rewrites the scalar columns; zero affected rows means the dataset does not exist.
pub async fn update_dataset_row<'e, E>(db: E, id: &str, fields: &DatasetFields, updated_by: &str) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r"
        UPDATE datasets SET name = ?, slug = ?, description = ?, classification = ?, category = ?, period = ?,
            unit_id = ?, business_field_id = ?, topic_id = ?, reference_id = ?, image = ?, metadatas = ?,
            validation_status = ?, is_highlight = ?, data_fixed = ?, updated_by = ?, updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(&fields.name)
    .bind(&fields.slug)
    .bind(&fields.description)
    .bind(&fields.classification)
    .bind(&fields.category)
    .bind(&fields.period)
    .bind(&fields.unit_id)
    .bind(&fields.business_field_id)
    .bind(&fields.topic_id)
    .bind(&fields.reference_id)
    .bind(&fields.image)
    .bind(&fields.metadatas)
    .bind(&fields.validation_status)
    .bind(fields.is_highlight)
    .bind(fields.data_fixed)
    .bind(updated_by)
    .bind(Utc::now())
    .bind(id)
    .execute(db)
    .await?;
    affected(result.rows_affected())
}

/// Replaces the tag set wholesale; run inside the caller's transaction.
pub async fn replace_dataset_tags(conn: &mut SqliteConnection, dataset_id: &str, tag_ids: &[String]) -> Result<(), DbError> {
    sqlx::query("DELETE FROM dataset_tags WHERE dataset_id = ?")
        .bind(dataset_id)
        .execute(&mut *conn)
        .await?;
    for tag_id in tag_ids {
        sqlx::query("INSERT INTO dataset_tags (dataset_id, tag_id) VALUES (?, ?)")
            .bind(dataset_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn get_dataset_state<'e, E>(db: E, id: &str) -> Result<DatasetState, DbError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, DatasetState>("SELECT organization_id, status FROM datasets WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(DbError::RowNotFound)
}

/// Unconditional status write; transition rules live with the caller.
pub async fn set_dataset_status<'e, E>(db: E, id: &str, status: &str, updated_by: &str) -> Result<(), DbError>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE datasets SET status = ?, updated_by = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(updated_by)
        .bind(Utc::now())
        .bind(id)
        .execute(db)
        .await?;
    affected(result.rows_affected())
}

/// Datasets owned by one organization, newest first.
pub async fn list_organization_datasets(
    db: &DbContext,
    organization_id: &str,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Dataset>, DbError> {
    let filter = DatasetFilter {
        organization_id: Some(organization_id),
        ..DatasetFilter::default()
    };
    list_datasets(db, &filter, sort, page).await
}
