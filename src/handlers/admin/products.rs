use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateProduct, Product, UpdateProduct};

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    #[serde(default)]
    pub company_id: Option<i64>,
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProduct>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;
    let product = queries::create_product(&conn, &input)?;
    tracing::info!(
        "Created product {} ({}) for company {}",
        product.id,
        product.name,
        product.company_id
    );
    Ok(Json(product))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<Product>>> {
    let conn = state.db.get()?;
    let products = queries::list_products(&conn, query.company_id)?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;
    let product = queries::get_product_by_id(&conn, id)?.ok_or(AppError::ProductNotFound)?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;

    if queries::get_product_by_id(&conn, id)?.is_none() {
        return Err(AppError::ProductNotFound);
    }
    if matches!(&input.name, Some(name) if name.trim().is_empty()) {
        return Err(AppError::BadRequest("Product name cannot be empty".into()));
    }

    queries::update_product(&conn, id, &input)?;

    let product = queries::get_product_by_id(&conn, id)?.ok_or(AppError::ProductNotFound)?;
    Ok(Json(product))
}
