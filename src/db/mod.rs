mod from_row;
pub mod queries;

pub use from_row::*;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::Config;
use crate::scans::ScanCounter;

pub type DbPool = Pool<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub scans: ScanCounter,
    /// Base URL for claim links printed into QR images
    pub frontend_url: String,
    pub admin_api_key: Option<String>,
    pub dev_mode: bool,
}

impl AppState {
    pub fn new(db: DbPool, scans: ScanCounter, config: &Config) -> Self {
        Self {
            db,
            scans,
            frontend_url: config.frontend_url.clone(),
            admin_api_key: config.admin_api_key.clone(),
            dev_mode: config.dev_mode,
        }
    }
}

/// Per-connection settings: WAL so scans never wait on writers, a busy
/// timeout so concurrent redeems queue instead of failing with SQLITE_BUSY.
fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )
}

pub fn create_pool(database_path: &str, max_size: u32) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(configure_connection);
    Pool::builder().max_size(max_size).build(manager)
}

pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            website TEXT,
            logo_url TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL REFERENCES companies(id),
            name TEXT NOT NULL,
            description TEXT,
            image_url TEXT,
            category TEXT,
            cashback_amount REAL NOT NULL DEFAULT 100.0,
            sku_prefix TEXT,
            marketplace_urls TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_company ON products(company_id);

        -- Append-only: rows are never updated or deleted
        CREATE TABLE IF NOT EXISTS batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id),
            sequence_no INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            serial_start INTEGER NOT NULL,
            serial_end INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (product_id, sequence_no),
            CHECK (serial_end - serial_start + 1 = quantity)
        );
        CREATE INDEX IF NOT EXISTS idx_batches_product_created ON batches(product_id, created_at);

        CREATE TABLE IF NOT EXISTS codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            value TEXT NOT NULL UNIQUE,
            product_id INTEGER NOT NULL REFERENCES products(id),
            batch_id INTEGER NOT NULL REFERENCES batches(id),
            serial INTEGER NOT NULL,
            is_used INTEGER NOT NULL DEFAULT 0,
            used_by TEXT,
            used_at INTEGER,
            scan_count INTEGER NOT NULL DEFAULT 0,
            last_scanned_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE (product_id, serial)
        );
        CREATE INDEX IF NOT EXISTS idx_codes_product_used ON codes(product_id, is_used);
        CREATE INDEX IF NOT EXISTS idx_codes_batch_serial ON codes(batch_id, serial);
        "#,
    )
}
