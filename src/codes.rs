//! Redemption code format: `PREFIX-SSSS-XXXX`.
//!
//! - `PREFIX` comes from the product's SKU prefix (uppercase alphanumerics,
//!   at most 8 characters, `QR` when the product has none).
//! - `SSSS` is the per-product serial, zero-padded to 4 digits.
//! - `XXXX` is a random suffix so the next code cannot be guessed from the
//!   printed serial.
//!
//! The part before the suffix is the display code printed under the QR image.

use rand::Rng;

pub const MIN_BATCH_QUANTITY: i64 = 1;
/// Practical ceiling for one printable label run.
pub const MAX_BATCH_QUANTITY: i64 = 500;

/// Attempts per serial before batch generation gives up.
pub const MAX_SUFFIX_ATTEMPTS: usize = 8;

const DEFAULT_PREFIX: &str = "QR";
const MAX_PREFIX_LEN: usize = 8;
const SUFFIX_LEN: usize = 4;
const SERIAL_WIDTH: usize = 4;

/// No 0/O or 1/I, so codes survive being typed in by hand.
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Canonical form used for storage and lookup.
pub fn normalize(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Derive the code prefix from a product's SKU prefix.
pub fn prefix_for(sku_prefix: Option<&str>) -> String {
    let prefix: String = sku_prefix
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_PREFIX_LEN)
        .collect();

    if prefix.is_empty() {
        DEFAULT_PREFIX.to_string()
    } else {
        prefix
    }
}

pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

pub fn format_code(prefix: &str, serial: i64, suffix: &str) -> String {
    format!("{}-{:0width$}-{}", prefix, serial, suffix, width = SERIAL_WIDTH)
}

/// `APG-0001-K7QX` -> `APG-0001`. Values without two separators are returned as-is.
pub fn display_code(value: &str) -> &str {
    match value.match_indices('-').nth(1) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Link encoded into the printed QR image.
pub fn claim_url(frontend_url: &str, value: &str) -> String {
    format!("{}/?code={}&claim=true", frontend_url.trim_end_matches('/'), value)
}

/// Parse input as a legacy deep-link product id (bare positive integer).
pub fn parse_legacy_product_id(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
