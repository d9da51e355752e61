use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::ProductView;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Code {
    pub value: String,
    pub product_id: i64,
    pub batch_id: i64,
    pub serial: i64,
    pub is_used: bool,
    /// Opaque claimant identity; admin-only, never part of public responses
    pub used_by: Option<String>,
    pub used_at: Option<i64>,
    pub scan_count: i64,
    pub last_scanned_at: Option<i64>,
    pub created_at: i64,
}

/// `?filter=` on code listings. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CodeFilter {
    #[default]
    All,
    Used,
    Unused,
}

impl CodeFilter {
    /// Value to match against `codes.is_used`, or None for no filter.
    pub fn is_used(self) -> Option<bool> {
        match self {
            CodeFilter::All => None,
            CodeFilter::Used => Some(true),
            CodeFilter::Unused => Some(false),
        }
    }
}

/// Redemption state as seen by whoever scanned the code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedemptionState {
    Unused { code: String },
    Used { code: String, used_at: Option<i64> },
    /// Input was a legacy numeric product id, not a code
    NotARedemptionCode,
}

impl RedemptionState {
    pub fn is_used(&self) -> bool {
        matches!(self, RedemptionState::Used { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub product: ProductView,
    pub state: RedemptionState,
}

/// Proof of a legitimate, consumed code handed to the claim workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub receipt_id: String,
    pub code: String,
    pub product_id: i64,
    pub product_name: String,
    pub batch_id: i64,
    pub serial: i64,
    pub claimant_id: String,
    pub redeemed_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    pub claimant_id: String,
    /// Product the client believes the code belongs to
    #[serde(default)]
    pub expected_product_id: Option<i64>,
}

/// One label for the sheet renderer.
#[derive(Debug, Clone, Serialize)]
pub struct PrintableCode {
    pub value: String,
    pub display_code: String,
    pub serial: i64,
    pub claim_url: String,
}
