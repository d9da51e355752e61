use axum::{extract::State, http::HeaderMap};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{RedeemRequest, RedemptionReceipt};
use crate::redemption;
use crate::util::extract_request_info;

/// POST /redeem
/// Consume a code for a reward/reel claim. Called by the claim workflow.
pub async fn redeem_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RedeemRequest>,
) -> Result<Json<RedemptionReceipt>> {
    let conn = state.db.get()?;

    let (ip, user_agent) = extract_request_info(&headers);
    tracing::debug!(
        "Redeem request for {} from ip={:?} ua={:?}",
        input.code.trim(),
        ip,
        user_agent
    );

    let receipt = redemption::redeem(
        &conn,
        &input.code,
        &input.claimant_id,
        input.expected_product_id,
    )?;

    Ok(Json(receipt))
}
