//! Code resolution: scanned or typed input -> product + redemption state.

use rusqlite::Connection;

use crate::codes;
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{RedemptionState, Resolution};
use crate::scans::ScanCounter;

/// Resolve a code (or a legacy numeric product id) to its product.
///
/// Read-only apart from the scan increment, which is queued on `scans` and
/// applied later. Resolving never changes redemption state, and a used code
/// still resolves (reporting when it was used, never by whom).
///
/// A bare integer is treated as a product id only when no code has that
/// literal value.
pub fn resolve(conn: &Connection, scans: &ScanCounter, input: &str) -> Result<Resolution> {
    let value = codes::normalize(input);
    if value.is_empty() {
        return Err(AppError::NotFound("product not found".into()));
    }

    if let Some(code) = queries::get_code_by_value(conn, &value)? {
        // Codes are only minted for existing products and products are never
        // deleted, so a miss here is store corruption
        let product = queries::get_product_by_id(conn, code.product_id)?.ok_or_else(|| {
            AppError::Internal(format!("code {} references missing product", code.value))
        })?;

        scans.record(&code.value);

        let state = if code.is_used {
            RedemptionState::Used {
                code: code.value,
                used_at: code.used_at,
            }
        } else {
            RedemptionState::Unused { code: code.value }
        };

        return Ok(Resolution {
            product: product.into(),
            state,
        });
    }

    if let Some(product_id) = codes::parse_legacy_product_id(&value) {
        if let Some(product) = queries::get_product_by_id(conn, product_id)? {
            return Ok(Resolution {
                product: product.into(),
                state: RedemptionState::NotARedemptionCode,
            });
        }
    }

    Err(AppError::NotFound("product not found".into()))
}
