use serde::{Deserialize, Serialize};

use super::Code;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: i64,
    pub product_id: i64,
    /// 1, 2, 3... per product
    pub sequence_no: i64,
    pub quantity: i64,
    pub serial_start: i64,
    /// Inclusive
    pub serial_end: i64,
    pub created_at: i64,
}

/// Ledger row for admin reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(flatten)]
    pub batch: Batch,
    pub product_name: String,
    pub used_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchWithCodes {
    #[serde(flatten)]
    pub batch: Batch,
    pub codes: Vec<Code>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBatch {
    pub quantity: i64,
}
