pub mod admin;
pub mod public;

use axum::Router;

use crate::db::AppState;

/// Full application router: public scan/redeem endpoints plus the admin API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(admin::router(state.clone()))
        .with_state(state)
}
