use std::collections::HashMap;

use rusqlite::{Connection, ErrorCode, Statement, TransactionBehavior, params, types::Value};

use crate::codes::{self, MAX_BATCH_QUANTITY, MAX_SUFFIX_ATTEMPTS, MIN_BATCH_QUANTITY};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::util::now;

use super::from_row::{
    BATCH_SUMMARY_COLS, CODE_COLS, COMPANY_COLS, PRODUCT_COLS, query_all, query_one,
};

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: i64,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: i64) -> Self {
        Self {
            table,
            id,
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Patch semantics for nullable columns: None = leave alone,
    /// Some(None) = set NULL, Some(Some(v)) = set v.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(Some(v)) => self.fields.push((column, v.into())),
            Some(None) => self.fields.push((column, Value::Null)),
            None => {}
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Companies ============

pub fn create_company(conn: &Connection, input: &CreateCompany) -> Result<Company> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Company name is required".into()));
    }
    let now = now();

    // UNIQUE(name) decides races between concurrent creates
    conn.execute(
        "INSERT INTO companies (name, description, website, logo_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![name, &input.description, &input.website, &input.logo_url, now, now],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            AppError::BadRequest("Company name already exists".into())
        }
        _ => AppError::Database(e),
    })?;

    Ok(Company {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        description: input.description.clone(),
        website: input.website.clone(),
        logo_url: input.logo_url.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_company_by_id(conn: &Connection, id: i64) -> Result<Option<Company>> {
    query_one(
        conn,
        &format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLS),
        params![id],
    )
}

pub fn list_companies(conn: &Connection) -> Result<Vec<Company>> {
    query_all(
        conn,
        &format!("SELECT {} FROM companies ORDER BY name", COMPANY_COLS),
        [],
    )
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Product name is required".into()));
    }
    if get_company_by_id(conn, input.company_id)?.is_none() {
        return Err(AppError::NotFound("Company not found".into()));
    }

    let now = now();
    let urls_json = serde_json::to_string(&input.marketplace_urls)?;

    conn.execute(
        "INSERT INTO products (company_id, name, description, image_url, category, cashback_amount, sku_prefix, marketplace_urls, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            input.company_id,
            name,
            &input.description,
            &input.image_url,
            &input.category,
            input.cashback_amount,
            &input.sku_prefix,
            &urls_json,
            input.is_active,
            now,
            now
        ],
    )?;

    Ok(Product {
        id: conn.last_insert_rowid(),
        company_id: input.company_id,
        name: name.to_string(),
        description: input.description.clone(),
        image_url: input.image_url.clone(),
        category: input.category.clone(),
        cashback_amount: input.cashback_amount,
        sku_prefix: input.sku_prefix.clone(),
        marketplace_urls: input.marketplace_urls.clone(),
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: i64) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        params![id],
    )
}

pub fn list_products(conn: &Connection, company_id: Option<i64>) -> Result<Vec<Product>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM products WHERE (?1 IS NULL OR company_id = ?1) ORDER BY created_at DESC, id DESC",
            PRODUCT_COLS
        ),
        params![company_id],
    )
}

pub fn update_product(conn: &Connection, id: i64, input: &UpdateProduct) -> Result<bool> {
    let urls_json = input
        .marketplace_urls
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    UpdateBuilder::new("products", id)
        .with_updated_at()
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_nullable("description", input.description.clone())
        .set_nullable("image_url", input.image_url.clone())
        .set_nullable("category", input.category.clone())
        .set_opt("cashback_amount", input.cashback_amount)
        .set_nullable("sku_prefix", input.sku_prefix.clone())
        .set_opt("marketplace_urls", urls_json)
        .set_opt("is_active", input.is_active)
        .execute(conn)
}

// ============ Batch Generation ============

/// Mint a batch of codes for a product with random suffixes.
pub fn generate_batch(conn: &mut Connection, product_id: i64, quantity: i64) -> Result<BatchWithCodes> {
    generate_batch_with(conn, product_id, quantity, codes::random_suffix)
}

/// Mint a batch of codes, drawing suffixes from `next_suffix`.
///
/// Runs in an IMMEDIATE transaction: the write lock is taken before the next
/// sequence number and serial are read, so concurrent generation for the same
/// product cannot allocate overlapping serials. Every error path drops the
/// transaction, so a failed batch leaves neither the batch row nor any code.
///
/// # PostgreSQL Migration Note
/// Lock the product row (`SELECT ... FOR UPDATE`) before reading the
/// batch maxima to get the same serialization per product.
pub fn generate_batch_with<F>(
    conn: &mut Connection,
    product_id: i64,
    quantity: i64,
    mut next_suffix: F,
) -> Result<BatchWithCodes>
where
    F: FnMut() -> String,
{
    if !(MIN_BATCH_QUANTITY..=MAX_BATCH_QUANTITY).contains(&quantity) {
        return Err(AppError::InvalidQuantity(quantity));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let product: Product = query_one(
        &tx,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        params![product_id],
    )?
    .ok_or(AppError::ProductNotFound)?;

    let (last_sequence, last_serial): (i64, i64) = tx.query_row(
        "SELECT COALESCE(MAX(sequence_no), 0), COALESCE(MAX(serial_end), 0)
         FROM batches WHERE product_id = ?1",
        params![product_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let now = now();
    let batch = Batch {
        id: 0,
        product_id,
        sequence_no: last_sequence + 1,
        quantity,
        serial_start: last_serial + 1,
        serial_end: last_serial + quantity,
        created_at: now,
    };

    tx.execute(
        "INSERT INTO batches (product_id, sequence_no, quantity, serial_start, serial_end, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            batch.product_id,
            batch.sequence_no,
            batch.quantity,
            batch.serial_start,
            batch.serial_end,
            batch.created_at
        ],
    )?;
    let batch = Batch {
        id: tx.last_insert_rowid(),
        ..batch
    };

    let prefix = codes::prefix_for(product.sku_prefix.as_deref());
    let mut minted = Vec::with_capacity(quantity as usize);
    {
        let mut exists = tx.prepare("SELECT 1 FROM codes WHERE value = ?1")?;
        let mut insert = tx.prepare(
            "INSERT INTO codes (value, product_id, batch_id, serial, is_used, scan_count, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)",
        )?;

        for serial in batch.serial_start..=batch.serial_end {
            // Codes inserted earlier in this batch are visible to `exists`
            let value = mint_unique_value(&mut exists, &prefix, serial, &mut next_suffix)?;
            insert.execute(params![&value, product_id, batch.id, serial, now])?;

            minted.push(Code {
                value,
                product_id,
                batch_id: batch.id,
                serial,
                is_used: false,
                used_by: None,
                used_at: None,
                scan_count: 0,
                last_scanned_at: None,
                created_at: now,
            });
        }
    }

    tx.commit()?;

    tracing::info!(
        "Generated batch #{} for product {} ({} codes, serials {}-{})",
        batch.sequence_no,
        product_id,
        batch.quantity,
        batch.serial_start,
        batch.serial_end
    );

    Ok(BatchWithCodes {
        batch,
        codes: minted,
    })
}

fn mint_unique_value<F>(
    exists: &mut Statement<'_>,
    prefix: &str,
    serial: i64,
    next_suffix: &mut F,
) -> Result<String>
where
    F: FnMut() -> String,
{
    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = codes::normalize(&codes::format_code(prefix, serial, &next_suffix()));
        if !exists.exists(params![&candidate])? {
            return Ok(candidate);
        }
        tracing::warn!(
            "Code collision on {} (attempt {}/{})",
            candidate,
            attempt,
            MAX_SUFFIX_ATTEMPTS
        );
    }
    Err(AppError::GenerationExhausted)
}

// ============ Codes ============

/// Look up a code by its canonical (uppercase, trimmed) value.
pub fn get_code_by_value(conn: &Connection, value: &str) -> Result<Option<Code>> {
    query_one(
        conn,
        &format!("SELECT {} FROM codes WHERE value = ?1", CODE_COLS),
        params![value],
    )
}

pub fn list_codes_for_batch(conn: &Connection, batch_id: i64, filter: CodeFilter) -> Result<Vec<Code>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM codes WHERE batch_id = ?1 AND (?2 IS NULL OR is_used = ?2) ORDER BY serial",
            CODE_COLS
        ),
        params![batch_id, filter.is_used()],
    )
}

pub fn list_codes_for_product(
    conn: &Connection,
    product_id: i64,
    filter: CodeFilter,
) -> Result<Vec<Code>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM codes WHERE product_id = ?1 AND (?2 IS NULL OR is_used = ?2) ORDER BY serial",
            CODE_COLS
        ),
        params![product_id, filter.is_used()],
    )
}

/// Atomically flip a code from unused to used, returning whether this call won.
///
/// Compare-and-swap on `is_used`: of any number of concurrent callers exactly
/// one sees an affected row. Losers (and any later caller) get `Ok(false)` and
/// the winner's `used_by`/`used_at` stay untouched.
pub fn try_mark_code_used(conn: &Connection, value: &str, claimant_id: &str, used_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE codes SET is_used = 1, used_by = ?1, used_at = ?2 WHERE value = ?3 AND is_used = 0",
        params![claimant_id, used_at, value],
    )?;
    Ok(affected > 0)
}

/// Apply aggregated scan counts in one transaction.
/// Returns the number of code rows touched (unknown values are skipped).
pub fn apply_scan_increments(
    conn: &mut Connection,
    increments: &HashMap<String, i64>,
    scanned_at: i64,
) -> Result<usize> {
    if increments.is_empty() {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let mut updated = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE codes SET scan_count = scan_count + ?1, last_scanned_at = ?2 WHERE value = ?3",
        )?;
        for (value, count) in increments {
            updated += stmt.execute(params![count, scanned_at, value])?;
        }
    }
    tx.commit()?;
    Ok(updated)
}

// ============ Batch Ledger ============

pub fn get_batch(conn: &Connection, id: i64) -> Result<Option<BatchSummary>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM batches b JOIN products p ON p.id = b.product_id WHERE b.id = ?1",
            BATCH_SUMMARY_COLS
        ),
        params![id],
    )
}

/// Most recent first.
pub fn list_batches_for_product(conn: &Connection, product_id: i64) -> Result<Vec<BatchSummary>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM batches b JOIN products p ON p.id = b.product_id
             WHERE b.product_id = ?1 ORDER BY b.created_at DESC, b.id DESC",
            BATCH_SUMMARY_COLS
        ),
        params![product_id],
    )
}

/// Most recent first, across every product of the company.
pub fn list_batches_for_company(conn: &Connection, company_id: i64) -> Result<Vec<BatchSummary>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM batches b JOIN products p ON p.id = b.product_id
             WHERE p.company_id = ?1 ORDER BY b.created_at DESC, b.id DESC",
            BATCH_SUMMARY_COLS
        ),
        params![company_id],
    )
}

/// Labels for the sheet renderer, serial ascending.
pub fn printable_codes(conn: &Connection, batch_id: i64, frontend_url: &str) -> Result<Vec<PrintableCode>> {
    let labels = list_codes_for_batch(conn, batch_id, CodeFilter::All)?
        .into_iter()
        .map(|code| PrintableCode {
            display_code: codes::display_code(&code.value).to_string(),
            claim_url: codes::claim_url(frontend_url, &code.value),
            serial: code.serial,
            value: code.value,
        })
        .collect();
    Ok(labels)
}
