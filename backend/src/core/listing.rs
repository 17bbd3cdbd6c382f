use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, FromRow};

use crate::core::{DbError, DbPoolType};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Column every sort falls back to when the requested one is not whitelisted.
pub const DEFAULT_SORT_COLUMN: &str = "created_at";

/// Common list query parameters. Numbers arrive as text so bad input falls back to defaults.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListQuery {
    #[must_use]
    pub fn page_request(&self, cap: i64) -> PageRequest {
        PageRequest::new(self.page.as_deref(), self.limit.as_deref(), cap)
    }

    #[must_use]
    pub fn sort(&self, whitelist: &'static [&'static str]) -> SortSpec {
        SortSpec::resolve(self.sort_by.as_deref(), self.sort_order.as_deref(), whitelist)
    }

    #[must_use]
    pub fn search(&self) -> Option<&str> {
        non_empty(self.search.as_deref())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Parses and clamps: page >= 1, 1 <= limit <= cap, defaulting to page 1 and 20 rows.
    #[must_use]
    pub fn new(page: Option<&str>, limit: Option<&str>, cap: i64) -> Self {
        let page = page.and_then(|p| p.trim().parse::<i64>().ok()).unwrap_or(1);
        let limit = limit.and_then(|l| l.trim().parse::<i64>().ok()).unwrap_or(DEFAULT_LIMIT);
        Self::clamped(page, limit, cap)
    }

    #[must_use]
    pub fn clamped(page: i64, limit: i64, cap: i64) -> Self {
        let page = page.max(1);
        let limit = if limit < 1 { DEFAULT_LIMIT } else { limit };
        Self {
            page,
            limit: limit.min(cap.max(1)),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    #[must_use]
    pub const fn new(page: i64, limit: i64, total: i64) -> Self {
        // limit is at least 1 once it went through PageRequest
        let total_pages = if total <= 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Injection-safe ORDER BY: the column always comes from a static whitelist.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortSpec {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub fn resolve(sort_by: Option<&str>, sort_order: Option<&str>, whitelist: &'static [&'static str]) -> Self {
        let requested = sort_by.map(str::trim).unwrap_or_default();
        let column = whitelist
            .iter()
            .copied()
            .find(|candidate| *candidate == requested)
            .unwrap_or(DEFAULT_SORT_COLUMN);
        let direction = match sort_order.map(str::trim) {
            Some(order) if order.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };
        Self { column, direction }
    }

    /// Renders ` ORDER BY col DIR, id DIR`; the id tie-break keeps pages contiguous.
    #[must_use]
    pub fn order_by(&self, alias: &str) -> String {
        let dir = self.direction.to_sql();
        format!(
            " ORDER BY {} {dir}, {} {dir}",
            qualify(alias, self.column),
            qualify(alias, "id")
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Which marker hides a soft-deleted row.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SoftDelete {
    Status,
    DeletedAt,
}

/// The non-deleted predicate every read path conjoins.
#[must_use]
pub fn live_rows(marker: SoftDelete, alias: &str) -> String {
    match marker {
        SoftDelete::Status => format!("{} != 'deleted'", qualify(alias, "status")),
        SoftDelete::DeletedAt => format!("{} IS NULL", qualify(alias, "deleted_at")),
    }
}

/// WHERE clause builder keeping SQL fragments and bound values in lockstep.
///
/// Column names are `&'static str` so only identifiers written in code reach the SQL text;
/// user input always travels as a bound value.
#[derive(Clone, Debug, Default)]
pub struct SqlFilter {
    clauses: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Conjunct without parameters, e.g. a soft-delete predicate.
    pub fn raw(&mut self, clause: impl Into<String>) -> &mut Self {
        self.clauses.push(clause.into());
        self
    }

    /// Conjunct with its own `?` placeholders, bound in order.
    pub fn with(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        self.clauses.push(clause.into());
        self.values.extend(values);
        self
    }

    /// `column = ?` when the value is present and not blank.
    pub fn eq(&mut self, column: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(value) = non_empty(value) {
            self.with(format!("{column} = ?"), [SqlValue::from(value)]);
        }
        self
    }

    pub fn flag(&mut self, column: &'static str, value: Option<bool>) -> &mut Self {
        if let Some(value) = value {
            self.with(format!("{column} = ?"), [SqlValue::Bool(value)]);
        }
        self
    }

    /// `(a LIKE ? OR b LIKE ?)` with one `%term%` value per column.
    pub fn search(&mut self, columns: &[&'static str], term: Option<&str>) -> &mut Self {
        let Some(term) = non_empty(term) else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like(term));
        let clause = columns
            .iter()
            .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.with(
            format!("({clause})"),
            columns.iter().map(|_| SqlValue::Text(pattern.clone())),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    #[must_use]
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Bound values followed by `extra` (e.g. LIMIT and OFFSET).
    pub fn arguments<'q>(&self, extra: &[SqlValue]) -> Result<SqliteArguments<'q>, DbError> {
        self.arguments_around(&[], extra)
    }

    /// Bound values framed by `leading` (e.g. an UPDATE's SET values) and `trailing`.
    pub fn arguments_around<'q>(
        &self,
        leading: &[SqlValue],
        trailing: &[SqlValue],
    ) -> Result<SqliteArguments<'q>, DbError> {
        let mut args = SqliteArguments::default();
        for value in leading.iter().chain(&self.values).chain(trailing) {
            let added = match value {
                SqlValue::Text(text) => args.add(text.clone()),
                SqlValue::Int(number) => args.add(*number),
                SqlValue::Bool(flag) => args.add(*flag),
            };
            added.map_err(|e| DbError::OperationFailed(sqlx::Error::Encode(e)))?;
        }
        Ok(args)
    }
}

/// The SQL pieces of one paginated listing.
#[derive(Clone, Copy, Debug)]
pub struct ListStatement<'a> {
    /// Projection, e.g. `d.id, d.name, o.name AS organization_name`
    pub select: &'a str,
    /// Source including joins
    pub from: &'a str,
    /// Source for the count; joins that do not filter are left out
    pub count_from: &'a str,
    /// Alias of the main table used for ordering, empty when unaliased
    pub alias: &'a str,
}

impl<'a> ListStatement<'a> {
    #[must_use]
    pub const fn table(table: &'a str) -> Self {
        Self {
            select: "*",
            from: table,
            count_from: table,
            alias: "",
        }
    }
}

/// Runs the count and the page query sharing one filter.
pub async fn fetch_page<T>(
    db: &DbPoolType,
    statement: ListStatement<'_>,
    filter: &SqlFilter,
    sort: SortSpec,
    page: PageRequest,
) -> Result<Page<T>, DbError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM {}{where_clause}", statement.count_from);
    let total: i64 = sqlx::query_scalar_with(&count_sql, filter.arguments(&[])?)
        .fetch_one(db)
        .await?;

    let rows_sql = format!(
        "SELECT {} FROM {}{where_clause}{} LIMIT ? OFFSET ?",
        statement.select,
        statement.from,
        sort.order_by(statement.alias)
    );
    let args = filter.arguments(&[SqlValue::Int(page.limit), SqlValue::Int(page.offset())])?;
    let rows = sqlx::query_as_with::<_, T, _>(&rows_sql, args).fetch_all(db).await?;

    Ok(Page {
        rows,
        meta: PageMeta::new(page.page, page.limit, total),
    })
}

#[must_use]
pub fn qualify(alias: &str, column: &str) -> String {
    if alias.is_empty() {
        column.to_string()
    } else {
        format!("{alias}.{column}")
    }
}

#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Query-string boolean: `true`/`1` and `false`/`0`; anything else means "no filter".
#[must_use]
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match non_empty(value)?.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITELIST: &[&str] = &["name", "created_at", "updated_at", "category", "classification"];

    #[test]
    fn test_page_request_clamps_out_of_range_values() {
        assert_eq!(PageRequest::new(Some("0"), Some("0"), MAX_LIMIT), PageRequest { page: 1, limit: 20 });
        assert_eq!(PageRequest::new(Some("-3"), Some("500"), MAX_LIMIT), PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(Some("abc"), None, MAX_LIMIT), PageRequest { page: 1, limit: 20 });
        assert_eq!(PageRequest::new(Some("3"), Some("5000"), 1000), PageRequest { page: 3, limit: 1000 });
        assert_eq!(PageRequest::new(Some("3"), Some("10"), MAX_LIMIT).offset(), 20);
    }

    #[test]
    fn test_total_pages_is_ceiling_of_total_over_limit() {
        assert_eq!(PageMeta::new(1, 20, 0).total_pages, 0);
        assert_eq!(PageMeta::new(1, 20, 1).total_pages, 1);
        assert_eq!(PageMeta::new(1, 20, 20).total_pages, 1);
        assert_eq!(PageMeta::new(1, 20, 21).total_pages, 2);
        assert_eq!(PageMeta::new(1, 1, 7).total_pages, 7);
        assert_eq!(PageMeta::new(1, 100, 1001).total_pages, 11);
    }

    #[test]
    fn test_sort_falls_back_to_created_at_desc() {
        let sort = SortSpec::resolve(Some("does_not_exist"), Some("xyz"), WHITELIST);
        assert_eq!(sort, SortSpec::resolve(Some("created_at"), Some("DESC"), WHITELIST));
        assert_eq!(sort.order_by("d"), " ORDER BY d.created_at DESC, d.id DESC");
    }

    #[test]
    fn test_sort_order_is_case_insensitive() {
        let sort = SortSpec::resolve(Some("name"), Some("aSc"), WHITELIST);
        assert_eq!(sort.column, "name");
        assert_eq!(sort.direction, SortDirection::Asc);
        assert_eq!(sort.order_by(""), " ORDER BY name ASC, id ASC");
    }

    #[test]
    fn test_sort_never_emits_unlisted_identifiers() {
        let hostile = [
            "name; DROP TABLE datasets",
            "created_at DESC --",
            "(SELECT 1)",
            "NAME",
            " name ",
            "",
        ];
        for sort_by in hostile {
            let sort = SortSpec::resolve(Some(sort_by), None, WHITELIST);
            assert!(WHITELIST.contains(&sort.column), "{sort_by} produced {}", sort.column);
        }
    }

    #[test]
    fn test_filter_keeps_clauses_and_values_in_lockstep() {
        let mut filter = SqlFilter::new();
        filter
            .raw(live_rows(SoftDelete::DeletedAt, "p"))
            .eq("p.status", Some("published"))
            .eq("p.dataset_id", Some("   "))
            .eq("p.organization_id", None)
            .flag("p.is_featured", Some(true))
            .search(&["p.title", "p.description"], Some("50%"));

        assert_eq!(
            filter.where_clause(),
            " WHERE p.deleted_at IS NULL AND p.status = ? AND p.is_featured = ? \
             AND (p.title LIKE ? ESCAPE '\\' OR p.description LIKE ? ESCAPE '\\')"
        );
        assert_eq!(
            filter.values(),
            &[
                SqlValue::from("published"),
                SqlValue::Bool(true),
                SqlValue::from("%50\\%%"),
                SqlValue::from("%50\\%%"),
            ]
        );
        let placeholders = filter.where_clause().matches('?').count();
        assert_eq!(placeholders, filter.values().len());
    }

    #[test]
    fn test_empty_filter_renders_no_where() {
        let filter = SqlFilter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.where_clause(), "");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(Some("TRUE")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some("maybe")), None);
        assert_eq!(parse_flag(None), None);
    }

    #[test]
    fn test_live_rows_predicates() {
        assert_eq!(live_rows(SoftDelete::Status, "u"), "u.status != 'deleted'");
        assert_eq!(live_rows(SoftDelete::DeletedAt, ""), "deleted_at IS NULL");
    }
}
