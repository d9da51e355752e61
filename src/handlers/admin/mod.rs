mod batches;
mod companies;
mod products;

pub use batches::*;
pub use companies::*;
pub use products::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Catalog (local replica used to validate batch generation)
        .route("/admin/companies", post(create_company).get(list_companies))
        .route("/admin/companies/{id}/batches", get(list_company_batches))
        .route("/admin/products", post(create_product).get(list_products))
        .route("/admin/products/{id}", get(get_product).put(update_product))
        // Code issuance and ledger
        .route(
            "/admin/products/{id}/batches",
            post(generate_batch).get(list_product_batches),
        )
        .route("/admin/products/{id}/codes", get(list_product_codes))
        .route("/admin/batches/{id}", get(get_batch))
        .route("/admin/batches/{id}/codes", get(list_batch_codes))
        .route("/admin/batches/{id}/print", get(print_batch))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
