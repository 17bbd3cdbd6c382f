//! Tags, topics, business fields and units: small named lookups with identical CRUD.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::core::{self, ApiError, ApiResponse, JsonBody, ListQuery, MAX_LIMIT, QueryParams, Validator, slugify};
use crate::db::{self, Taxonomy, Term};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TermRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnitRequest {
    pub name: String,
    pub symbol: String,
}

fn handle_error(e: core::DbError, resource: &str) -> ApiError {
    ApiError::from_db(e, resource)
}

async fn list_terms(
    context: &core::Context,
    taxonomy: Taxonomy,
    query: &ListQuery,
) -> Result<ApiResponse<Vec<Term>>, ApiError> {
    let page = db::list_terms(
        &context.db,
        taxonomy,
        query.search(),
        query.sort(db::TERM_SORT_COLUMNS),
        query.page_request(MAX_LIMIT),
    )
    .await
    .map_err(|e| handle_error(e, taxonomy.label()))?;
    Ok(ApiResponse::page(format!("{}s retrieved successfully", taxonomy.label()), page))
}

async fn get_term(context: &core::Context, taxonomy: Taxonomy, id: &str) -> Result<ApiResponse<Term>, ApiError> {
    let term = db::get_term(&context.db, taxonomy, id)
        .await
        .map_err(|e| handle_error(e, taxonomy.label()))?;
    Ok(ApiResponse::ok(format!("{} retrieved successfully", taxonomy.label()), term))
}

async fn create_term(
    context: &core::Context,
    taxonomy: Taxonomy,
    request: &TermRequest,
) -> Result<ApiResponse<Term>, ApiError> {
    Validator::new().required("name", &request.name).finish()?;
    let name = request.name.trim();
    let term = db::create_term(&context.db, taxonomy, name, &slugify(name))
        .await
        .map_err(|e| handle_error(e, taxonomy.label()))?;
    Ok(ApiResponse::created(format!("{} created successfully", taxonomy.label()), term))
}

async fn update_term(
    context: &core::Context,
    taxonomy: Taxonomy,
    id: &str,
    request: &TermRequest,
) -> Result<ApiResponse<Term>, ApiError> {
    Validator::new().required("name", &request.name).finish()?;
    let name = request.name.trim();
    let term = db::update_term(&context.db, taxonomy, id, name, &slugify(name))
        .await
        .map_err(|e| handle_error(e, taxonomy.label()))?;
    Ok(ApiResponse::updated(format!("{} updated successfully", taxonomy.label()), term))
}

async fn delete_term(context: &core::Context, taxonomy: Taxonomy, id: &str) -> Result<ApiResponse<()>, ApiError> {
    db::delete_term(&context.db, taxonomy, id)
        .await
        .map_err(|e| handle_error(e, taxonomy.label()))?;
    Ok(ApiResponse::deleted(format!("{} deleted successfully", taxonomy.label())))
}

/// Handler set for one lookup table.
macro_rules! term_handlers {
    ($module:ident, $taxonomy:expr) => {
        pub mod $module {
            use super::*;

            pub async fn list(
                State(context): State<core::ArcContext>,
                QueryParams(query): QueryParams<ListQuery>,
            ) -> Result<impl IntoResponse, ApiError> {
                list_terms(&context, $taxonomy, &query).await
            }

            pub async fn get_by_id(
                State(context): State<core::ArcContext>,
                Path(id): Path<String>,
            ) -> Result<impl IntoResponse, ApiError> {
                get_term(&context, $taxonomy, &id).await
            }

            pub async fn create(
                State(context): State<core::ArcContext>,
                JsonBody(request): JsonBody<TermRequest>,
            ) -> Result<impl IntoResponse, ApiError> {
                create_term(&context, $taxonomy, &request).await
            }

            pub async fn update(
                State(context): State<core::ArcContext>,
                Path(id): Path<String>,
                JsonBody(request): JsonBody<TermRequest>,
            ) -> Result<impl IntoResponse, ApiError> {
                update_term(&context, $taxonomy, &id, &request).await
            }

            pub async fn delete(
                State(context): State<core::ArcContext>,
                Path(id): Path<String>,
            ) -> Result<impl IntoResponse, ApiError> {
                delete_term(&context, $taxonomy, &id).await
            }
        }
    };
}

term_handlers!(tags, Taxonomy::Tag);
term_handlers!(topics, Taxonomy::Topic);
term_handlers!(business_fields, Taxonomy::BusinessField);

pub mod units {
    use super::*;

    fn validate(request: &UnitRequest) -> Result<(), ApiError> {
        Validator::new()
            .required("name", &request.name)
            .required("symbol", &request.symbol)
            .finish()
    }

    pub async fn list(
        State(context): State<core::ArcContext>,
        QueryParams(query): QueryParams<ListQuery>,
    ) -> Result<impl IntoResponse, ApiError> {
        let page = db::list_units(
            &context.db,
            query.search(),
            query.sort(db::UNIT_SORT_COLUMNS),
            query.page_request(MAX_LIMIT),
        )
        .await
        .map_err(|e| handle_error(e, "Unit"))?;
        Ok(ApiResponse::page("Units retrieved successfully", page))
    }

    pub async fn get_by_id(
        State(context): State<core::ArcContext>,
        Path(id): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        let unit = db::get_unit(&context.db, &id).await.map_err(|e| handle_error(e, "Unit"))?;
        Ok(ApiResponse::ok("Unit retrieved successfully", unit))
    }

    pub async fn create(
        State(context): State<core::ArcContext>,
        JsonBody(request): JsonBody<UnitRequest>,
    ) -> Result<impl IntoResponse, ApiError> {
        validate(&request)?;
        let unit = db::create_unit(&context.db, request.name.trim(), request.symbol.trim())
            .await
            .map_err(|e| handle_error(e, "Unit"))?;
        Ok(ApiResponse::created("Unit created successfully", unit))
    }

    pub async fn update(
        State(context): State<core::ArcContext>,
        Path(id): Path<String>,
        JsonBody(request): JsonBody<UnitRequest>,
    ) -> Result<impl IntoResponse, ApiError> {
        validate(&request)?;
        let unit = db::update_unit(&context.db, &id, request.name.trim(), request.symbol.trim())
            .await
            .map_err(|e| handle_error(e, "Unit"))?;
        Ok(ApiResponse::updated("Unit updated successfully", unit))
    }

    pub async fn delete(
        State(context): State<core::ArcContext>,
        Path(id): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        db::delete_unit(&context.db, &id).await.map_err(|e| handle_error(e, "Unit"))?;
        Ok(ApiResponse::deleted("Unit deleted successfully"))
    }
}
