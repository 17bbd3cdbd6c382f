use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::core::{DbContext, DbError, SoftDelete, live_rows};

pub const DEFAULT_POPULAR_LIMIT: i64 = 10;
pub const MAX_POPULAR_LIMIT: i64 = 100;
pub const DEFAULT_TREND_DAYS: i64 = 30;
pub const MAX_TREND_DAYS: i64 = 365;

#[derive(Debug, Serialize)]
pub struct DatasetStats {
    pub total: i64,
    pub draft: i64,
    pub published: i64,
    pub archived: i64,
    pub total_downloads: i64,
    pub total_views: i64,
}

#[derive(Debug, Serialize)]
pub struct OrganizationStats {
    pub total: i64,
    pub active: i64,
    pub total_datasets: i64,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub created_this_month: i64,
}

#[derive(Debug, FromRow, Serialize)]
pub struct PopularDataset {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub organization_id: String,
    pub downloads: i64,
    pub views: i64,
}

#[derive(Debug, FromRow, Serialize)]
pub struct PopularTag {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub dataset_count: i64,
}

#[derive(Debug, FromRow, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub datasets: DatasetStats,
    pub organizations: OrganizationStats,
    pub users: UserStats,
    pub popular_datasets: Vec<PopularDataset>,
    pub popular_tags: Vec<PopularTag>,
    pub dataset_trend: Vec<TrendPoint>,
}

pub async fn dataset_stats(db: &DbContext) -> Result<DatasetStats, DbError> {
    let (total, draft, published, archived): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
         COALESCE(SUM(status = 'draft'), 0), \
         COALESCE(SUM(status = 'published'), 0), \
         COALESCE(SUM(status = 'archived'), 0) \
         FROM datasets",
    )
    .fetch_one(db)
    .await?;

    let sql = format!(
        "SELECT COALESCE(SUM(download_count), 0), COALESCE(SUM(view_count), 0) \
         FROM publications WHERE dataset_id IS NOT NULL AND {}",
        live_rows(SoftDelete::DeletedAt, "")
    );
    let (total_downloads, total_views): (i64, i64) = sqlx::query_as(&sql).fetch_one(db).await?;

    Ok(DatasetStats {
        total,
        draft,
        published,
        archived,
        total_downloads,
        total_views,
    })
}

pub async fn organization_stats(db: &DbContext) -> Result<OrganizationStats, DbError> {
    let (total, active, total_datasets): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(status = 'active'), 0), COALESCE(SUM(total_datasets), 0) FROM organizations",
    )
    .fetch_one(db)
    .await?;
    Ok(OrganizationStats {
        total,
        active,
        total_datasets,
    })
}

pub async fn user_stats(db: &DbContext) -> Result<UserStats, DbError> {
    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let sql = format!(
        "SELECT COUNT(*), COALESCE(SUM(status = 'active'), 0), COALESCE(SUM(created_at >= ?), 0) \
         FROM users WHERE {}",
        live_rows(SoftDelete::Status, "")
    );
    let (total, active, created_this_month): (i64, i64, i64) =
        sqlx::query_as(&sql).bind(month_start).fetch_one(db).await?;
    Ok(UserStats {
        total,
        active,
        created_this_month,
    })
}

/// Published datasets ranked by the downloads, then views, of their publications.
pub async fn popular_datasets(db: &DbContext, limit: i64) -> Result<Vec<PopularDataset>, DbError> {
    let sql = format!(
        "SELECT d.id, d.name, d.slug, d.organization_id, \
         COALESCE(SUM(p.download_count), 0) AS downloads, COALESCE(SUM(p.view_count), 0) AS views \
         FROM datasets d \
         LEFT JOIN publications p ON p.dataset_id = d.id AND {} \
         WHERE d.status = 'published' \
         GROUP BY d.id \
         ORDER BY downloads DESC, views DESC, d.name ASC \
         LIMIT ?",
        live_rows(SoftDelete::DeletedAt, "p")
    );
    let rows = sqlx::query_as::<_, PopularDataset>(&sql)
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Tags ranked by how many non-archived datasets carry them.
pub async fn popular_tags(db: &DbContext, limit: i64) -> Result<Vec<PopularTag>, DbError> {
    let rows = sqlx::query_as::<_, PopularTag>(
        "SELECT t.id, t.name, t.slug, COUNT(d.id) AS dataset_count \
         FROM tags t \
         JOIN dataset_tags dt ON dt.tag_id = t.id \
         JOIN datasets d ON d.id = dt.dataset_id AND d.status != 'archived' \
         GROUP BY t.id \
         ORDER BY dataset_count DESC, t.name ASC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Daily dataset creations over the last `days` days; days without creations are omitted.
pub async fn dataset_trend(db: &DbContext, days: i64) -> Result<Vec<TrendPoint>, DbError> {
    let since: DateTime<Utc> = Utc::now() - Duration::days(days);
    let rows = sqlx::query_as::<_, TrendPoint>(
        "SELECT substr(created_at, 1, 10) AS date, COUNT(*) AS count \
         FROM datasets WHERE created_at >= ? \
         GROUP BY date ORDER BY date ASC",
    )
    .bind(since)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn dashboard(db: &DbContext) -> Result<Dashboard, DbError> {
    let (datasets, organizations, users, popular_datasets, popular_tags, dataset_trend) = tokio::try_join!(
        dataset_stats(db),
        organization_stats(db),
        user_stats(db),
        popular_datasets(db, DEFAULT_POPULAR_LIMIT),
        popular_tags(db, DEFAULT_POPULAR_LIMIT),
        dataset_trend(db, DEFAULT_TREND_DAYS),
    )?;
    Ok(Dashboard {
        datasets,
        organizations,
        users,
        popular_datasets,
        popular_tags,
        dataset_trend,
    })
}
