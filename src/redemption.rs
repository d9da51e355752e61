//! The only write path for a code's redemption state.

use rusqlite::Connection;
use uuid::Uuid;

use crate::codes;
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::RedemptionReceipt;
use crate::util::now;

/// Consume `code` on behalf of `claimant_id`.
///
/// At most one call per code ever succeeds: the flip is a single conditional
/// UPDATE, and every caller that finds the flag already set gets
/// `AlreadyRedeemed`. When `expected_product_id` is given and disagrees with
/// the code's product the code is left untouched and `ProductMismatch` is
/// returned.
///
/// If the caller times out before seeing the result it must re-check the code
/// through resolution rather than retry, since the flip may have committed.
pub fn redeem(
    conn: &Connection,
    code: &str,
    claimant_id: &str,
    expected_product_id: Option<i64>,
) -> Result<RedemptionReceipt> {
    let claimant_id = claimant_id.trim();
    if claimant_id.is_empty() {
        return Err(AppError::BadRequest("claimant_id is required".into()));
    }

    let value = codes::normalize(code);
    let existing = queries::get_code_by_value(conn, &value)?
        .ok_or_else(|| AppError::NotFound("code not found".into()))?;

    if let Some(expected) = expected_product_id {
        if expected != existing.product_id {
            tracing::warn!(
                "Redeem of {} asserted product {} but code belongs to {}",
                existing.value,
                expected,
                existing.product_id
            );
            return Err(AppError::ProductMismatch);
        }
    }

    // Loaded before the flip so store corruption never consumes a code
    let product = queries::get_product_by_id(conn, existing.product_id)?.ok_or_else(|| {
        AppError::Internal(format!("code {} references missing product", existing.value))
    })?;

    let redeemed_at = now();
    if !queries::try_mark_code_used(conn, &existing.value, claimant_id, redeemed_at)? {
        tracing::info!("Rejected redeem of already-used code {}", existing.value);
        return Err(AppError::AlreadyRedeemed);
    }

    tracing::info!(
        "Code {} (product {}, serial {}) redeemed by {}",
        existing.value,
        existing.product_id,
        existing.serial,
        claimant_id
    );

    Ok(RedemptionReceipt {
        receipt_id: Uuid::new_v4().to_string(),
        code: existing.value,
        product_id: existing.product_id,
        product_name: product.name,
        batch_id: existing.batch_id,
        serial: existing.serial,
        claimant_id: claimant_id.to_string(),
        redeemed_at,
    })
}
