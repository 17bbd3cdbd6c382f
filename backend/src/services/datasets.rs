use sqlx::sqlite::SqliteConnection;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::core::{Context, DbError, Page, PageRequest, SortSpec, slugify};
use crate::db::{self, Dataset, DatasetFields, DatasetFilter, NewDataset, OrganizationCounter};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset not found")]
    NotFound,

    #[error("Organization ID is required")]
    OrganizationRequired,

    #[error("Archived datasets cannot change status")]
    ArchivedStatusLocked,

    #[error("Referenced record does not exist")]
    InvalidReference,

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for DatasetError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::RowNotFound => Self::NotFound,
            DbError::ForeignKeyViolation(_) => Self::InvalidReference,
            e => Self::Database(e),
        }
    }
}

impl From<sqlx::Error> for DatasetError {
    fn from(e: sqlx::Error) -> Self {
        DbError::from(e).into()
    }
}

/// Caller-supplied part of a create or update.
#[derive(Clone, Debug, Default)]
pub struct DatasetInput {
    pub fields: DatasetFields,
    pub tag_ids: Vec<String>,
}

pub async fn list(
    context: &Context,
    filter: &DatasetFilter<'_>,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<Dataset>, DatasetError> {
    Ok(db::list_datasets(&context.db, filter, sort, page).await?)
}

pub async fn get_by_id(context: &Context, id: &str) -> Result<Dataset, DatasetError> {
    Ok(db::get_dataset_by_id(&context.db, id).await?)
}

pub async fn get_by_slug(context: &Context, slug: &str) -> Result<Dataset, DatasetError> {
    Ok(db::get_dataset_by_slug(&context.db, slug).await?)
}

/// Inserts the row and its tag links in one transaction, then re-reads the aggregate.
pub async fn create(context: &Context, identity: &Identity, input: DatasetInput) -> Result<Dataset, DatasetError> {
    if identity.organization_id.trim().is_empty() {
        return Err(DatasetError::OrganizationRequired);
    }

    let id = Uuid::new_v4().to_string();
    let tag_ids = distinct_tag_ids(input.tag_ids);
    let mut fields = input.fields;

    let mut tx = context.db.begin().await?;
    fields.slug = unique_slug(&mut tx, &fields.name, None).await?;
    db::insert_dataset(
        &mut *tx,
        &NewDataset {
            id: &id,
            organization_id: &identity.organization_id,
            created_by: &identity.user_id,
            status: db::STATUS_DRAFT,
            fields: &fields,
        },
    )
    .await?;
    db::replace_dataset_tags(&mut tx, &id, &tag_ids).await?;
    adjust_counters(&mut tx, &identity.organization_id, None, db::STATUS_DRAFT).await?;
    tx.commit().await?;

    tracing::info!(dataset_id = %id, user_id = %identity.user_id, tags = tag_ids.len(), "Dataset created");
    get_by_id(context, &id).await
}

/// Rewrites scalars and replaces the tag set atomically. Absent optional fields are cleared.
pub async fn update(
    context: &Context,
    identity: &Identity,
    id: &str,
    input: DatasetInput,
) -> Result<Dataset, DatasetError> {
    let tag_ids = distinct_tag_ids(input.tag_ids);
    let mut fields = input.fields;

    let mut tx = context.db.begin().await?;
    fields.slug = unique_slug(&mut tx, &fields.name, Some(id)).await?;
    db::update_dataset_row(&mut *tx, id, &fields, &identity.user_id).await?;
    db::replace_dataset_tags(&mut tx, id, &tag_ids).await?;
    tx.commit().await?;

    tracing::info!(dataset_id = %id, user_id = %identity.user_id, tags = tag_ids.len(), "Dataset updated");
    get_by_id(context, id).await
}

/// Soft delete: the dataset is archived, never removed.
pub async fn archive(context: &Context, identity: &Identity, id: &str) -> Result<(), DatasetError> {
    let mut tx = context.db.begin().await?;
    let state = db::get_dataset_state(&mut *tx, id).await?;
    db::set_dataset_status(&mut *tx, id, db::STATUS_ARCHIVED, &identity.user_id).await?;
    adjust_counters(&mut tx, &state.organization_id, Some(&state.status), db::STATUS_ARCHIVED).await?;
    tx.commit().await?;

    tracing::info!(dataset_id = %id, user_id = %identity.user_id, "Dataset archived");
    Ok(())
}

/// Moves a dataset between draft, published and archived. Archived is terminal.
pub async fn update_status(
    context: &Context,
    identity: &Identity,
    id: &str,
    status: &str,
) -> Result<Dataset, DatasetError> {
    let mut tx = context.db.begin().await?;
    let state = db::get_dataset_state(&mut *tx, id).await?;
    if state.status == status {
        tx.rollback().await?;
        return get_by_id(context, id).await;
    }
    if state.status == db::STATUS_ARCHIVED {
        return Err(DatasetError::ArchivedStatusLocked);
    }

    db::set_dataset_status(&mut *tx, id, status, &identity.user_id).await?;
    adjust_counters(&mut tx, &state.organization_id, Some(&state.status), status).await?;
    tx.commit().await?;

    tracing::info!(dataset_id = %id, from = %state.status, to = %status, "Dataset status changed");
    get_by_id(context, id).await
}

/// Slug derived from the name, suffixed `-2`, `-3`, ... until no other dataset uses it.
async fn unique_slug(conn: &mut SqliteConnection, name: &str, except_id: Option<&str>) -> Result<String, DatasetError> {
    let mut base = slugify(name);
    if base.is_empty() {
        base = "dataset".to_string();
    }

    let mut candidate = base.clone();
    let mut suffix = 2;
    while db::dataset_slug_taken(&mut *conn, &candidate, except_id).await? {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

/// Keeps first occurrences, dropping blanks and repeats.
fn distinct_tag_ids(tag_ids: Vec<String>) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::with_capacity(tag_ids.len());
    for tag_id in tag_ids {
        let tag_id = tag_id.trim().to_string();
        if !tag_id.is_empty() && !distinct.contains(&tag_id) {
            distinct.push(tag_id);
        }
    }
    distinct
}

/// A dataset counts toward `total_datasets` unless archived and toward `public_datasets` while published.
fn counted(status: Option<&str>) -> (bool, bool) {
    match status {
        None => (false, false),
        Some(status) => (status != db::STATUS_ARCHIVED, status == db::STATUS_PUBLISHED),
    }
}

async fn adjust_counters(
    conn: &mut SqliteConnection,
    organization_id: &str,
    from: Option<&str>,
    to: &str,
) -> Result<(), DatasetError> {
    let (was_live, was_public) = counted(from);
    let (is_live, is_public) = counted(Some(to));

    for (counter, before, after) in [
        (OrganizationCounter::TotalDatasets, was_live, is_live),
        (OrganizationCounter::PublicDatasets, was_public, is_public),
    ] {
        let touched = match (before, after) {
            (false, true) => db::increment_organization_counter(&mut *conn, organization_id, counter).await?,
            (true, false) => db::decrement_organization_counter(&mut *conn, organization_id, counter).await?,
            _ => continue,
        };
        if !touched {
            tracing::debug!(organization_id = %organization_id, "No organization row to count against");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_tag_ids_keeps_first_occurrence() {
        let ids = vec!["t2".into(), " t1 ".into(), "t2".into(), String::new(), "t3".into()];
        assert_eq!(distinct_tag_ids(ids), vec!["t2", "t1", "t3"]);
    }

    #[test]
    fn test_counted_statuses() {
        assert_eq!(counted(None), (false, false));
        assert_eq!(counted(Some("draft")), (true, false));
        assert_eq!(counted(Some("published")), (true, true));
        assert_eq!(counted(Some("archived")), (false, false));
    }
}
