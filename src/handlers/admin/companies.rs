use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{Company, CreateCompany};

pub async fn create_company(
    State(state): State<AppState>,
    Json(input): Json<CreateCompany>,
) -> Result<Json<Company>> {
    let conn = state.db.get()?;
    let company = queries::create_company(&conn, &input)?;
    tracing::info!("Created company {} ({})", company.id, company.name);
    Ok(Json(company))
}

pub async fn list_companies(State(state): State<AppState>) -> Result<Json<Vec<Company>>> {
    let conn = state.db.get()?;
    let companies = queries::list_companies(&conn)?;
    Ok(Json(companies))
}
