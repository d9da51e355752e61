use axum::extract::State;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::models::Resolution;
use crate::resolver;

/// GET /qr/{code}
/// Resolve a scanned code (or legacy numeric product id) to its product.
pub async fn resolve_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Resolution>> {
    let conn = state.db.get()?;
    let resolution = resolver::resolve(&conn, &state.scans, &code)?;
    Ok(Json(resolution))
}
