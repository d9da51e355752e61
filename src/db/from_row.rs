//! Row mapping: each model lists its columns once and implements [`FromRow`]
//! against that exact order.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, Params, Row};

use crate::error::Result;
use crate::models::{Batch, BatchSummary, Code, Company, Product};

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub const COMPANY_COLS: &str =
    "id, name, description, website, logo_url, created_at, updated_at";

pub const PRODUCT_COLS: &str = "id, company_id, name, description, image_url, category, \
     cashback_amount, sku_prefix, marketplace_urls, is_active, created_at, updated_at";

/// Batch columns (aliased `b`) plus product name and redeemed-code count.
pub const BATCH_SUMMARY_COLS: &str = "b.id, b.product_id, b.sequence_no, b.quantity, \
     b.serial_start, b.serial_end, b.created_at, p.name, \
     (SELECT COUNT(*) FROM codes c WHERE c.batch_id = b.id AND c.is_used = 1)";

pub const CODE_COLS: &str = "value, product_id, batch_id, serial, is_used, used_by, used_at, \
     scan_count, last_scanned_at, created_at";

impl FromRow for Company {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            website: row.get(3)?,
            logo_url: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let urls_json: String = row.get(8)?;
        let marketplace_urls: BTreeMap<String, String> = serde_json::from_str(&urls_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Product {
            id: row.get(0)?,
            company_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            image_url: row.get(4)?,
            category: row.get(5)?,
            cashback_amount: row.get(6)?,
            sku_prefix: row.get(7)?,
            marketplace_urls,
            is_active: row.get::<_, i32>(9)? != 0,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Batch {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Batch {
            id: row.get(0)?,
            product_id: row.get(1)?,
            sequence_no: row.get(2)?,
            quantity: row.get(3)?,
            serial_start: row.get(4)?,
            serial_end: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for BatchSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BatchSummary {
            batch: Batch::from_row(row)?,
            product_name: row.get(7)?,
            used_count: row.get(8)?,
        })
    }
}

impl FromRow for Code {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Code {
            value: row.get(0)?,
            product_id: row.get(1)?,
            batch_id: row.get(2)?,
            serial: row.get(3)?,
            is_used: row.get::<_, i32>(4)? != 0,
            used_by: row.get(5)?,
            used_at: row.get(6)?,
            scan_count: row.get(7)?,
            last_scanned_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

pub fn query_one<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let item = stmt.query_row(params, |row| T::from_row(row)).optional()?;
    Ok(item)
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let items = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}
