use std::str::FromStr;

use axum::extract::{Extension, State};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AdminContext;
use crate::models::{BatchSummary, BatchWithCodes, Code, CodeFilter, CreateBatch, PrintableCode};

#[derive(Debug, Deserialize)]
pub struct CodeListQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

impl CodeListQuery {
    fn code_filter(&self) -> Result<CodeFilter> {
        match self.filter.as_deref().map(str::trim) {
            None | Some("") => Ok(CodeFilter::All),
            Some(raw) => CodeFilter::from_str(raw).map_err(|_| {
                AppError::BadRequest(format!(
                    "invalid filter '{}' (expected all, used or unused)",
                    raw
                ))
            }),
        }
    }
}

/// Printable set for the label renderer.
#[derive(Debug, serde::Serialize)]
pub struct PrintableBatch {
    #[serde(flatten)]
    pub batch: BatchSummary,
    pub codes: Vec<PrintableCode>,
}

/// POST /admin/products/{id}/batches
/// Mint a new batch of codes. All-or-nothing.
pub async fn generate_batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(product_id): Path<i64>,
    Json(input): Json<CreateBatch>,
) -> Result<Json<BatchWithCodes>> {
    if ctx.via_dev_mode {
        tracing::warn!("Generating batch for product {} without admin key (dev mode)", product_id);
    }

    let mut conn = state.db.get()?;
    let batch = queries::generate_batch(&mut conn, product_id, input.quantity)?;
    Ok(Json(batch))
}

/// GET /admin/products/{id}/batches
pub async fn list_product_batches(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<BatchSummary>>> {
    let conn = state.db.get()?;
    if queries::get_product_by_id(&conn, product_id)?.is_none() {
        return Err(AppError::ProductNotFound);
    }
    let batches = queries::list_batches_for_product(&conn, product_id)?;
    Ok(Json(batches))
}

/// GET /admin/companies/{id}/batches
pub async fn list_company_batches(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
) -> Result<Json<Vec<BatchSummary>>> {
    let conn = state.db.get()?;
    if queries::get_company_by_id(&conn, company_id)?.is_none() {
        return Err(AppError::NotFound("Company not found".into()));
    }
    let batches = queries::list_batches_for_company(&conn, company_id)?;
    Ok(Json(batches))
}

/// GET /admin/batches/{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
) -> Result<Json<BatchSummary>> {
    let conn = state.db.get()?;
    let batch = queries::get_batch(&conn, batch_id)?
        .ok_or_else(|| AppError::NotFound("Batch not found".into()))?;
    Ok(Json(batch))
}

/// GET /admin/batches/{id}/codes?filter=all|used|unused
pub async fn list_batch_codes(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
    Query(query): Query<CodeListQuery>,
) -> Result<Json<Vec<Code>>> {
    let filter = query.code_filter()?;
    let conn = state.db.get()?;
    if queries::get_batch(&conn, batch_id)?.is_none() {
        return Err(AppError::NotFound("Batch not found".into()));
    }
    tracing::debug!("Listing {} codes for batch {}", filter.as_ref(), batch_id);
    let codes = queries::list_codes_for_batch(&conn, batch_id, filter)?;
    Ok(Json(codes))
}

/// GET /admin/products/{id}/codes?filter=all|used|unused
pub async fn list_product_codes(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<CodeListQuery>,
) -> Result<Json<Vec<Code>>> {
    let filter = query.code_filter()?;
    let conn = state.db.get()?;
    if queries::get_product_by_id(&conn, product_id)?.is_none() {
        return Err(AppError::ProductNotFound);
    }
    tracing::debug!("Listing {} codes for product {}", filter.as_ref(), product_id);
    let codes = queries::list_codes_for_product(&conn, product_id, filter)?;
    Ok(Json(codes))
}

/// GET /admin/batches/{id}/print
/// Every code in the batch with its display code and the claim URL to encode.
pub async fn print_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
) -> Result<Json<PrintableBatch>> {
    let conn = state.db.get()?;
    let batch = queries::get_batch(&conn, batch_id)?
        .ok_or_else(|| AppError::NotFound("Batch not found".into()))?;

    let labels = queries::printable_codes(&conn, batch_id, &state.frontend_url)?;

    Ok(Json(PrintableBatch {
        batch,
        codes: labels,
    }))
}
