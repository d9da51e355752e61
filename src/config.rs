use std::env;
use std::time::Duration;

use crate::scans::ScanSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base URL of the customer-facing front end (claim links point here)
    pub frontend_url: String,
    /// Shared secret for the admin API (None = admin API closed outside dev mode)
    pub admin_api_key: Option<String>,
    pub dev_mode: bool,
    /// Max queued scan increments before new ones are dropped
    pub scan_queue_capacity: usize,
    pub scan_flush_interval_ms: u64,
    /// Distinct pending codes that trigger an early flush
    pub scan_flush_threshold: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("QRCLAIM_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let admin_api_key = env::var("ADMIN_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "qrclaim.db".to_string()),
            frontend_url,
            admin_api_key,
            dev_mode,
            scan_queue_capacity: parse_or("SCAN_QUEUE_CAPACITY", 10_000),
            scan_flush_interval_ms: parse_or("SCAN_FLUSH_INTERVAL_MS", 1_000),
            scan_flush_threshold: parse_or("SCAN_FLUSH_THRESHOLD", 500),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            queue_capacity: self.scan_queue_capacity.max(1),
            flush_interval: Duration::from_millis(self.scan_flush_interval_ms.max(1)),
            flush_threshold: self.scan_flush_threshold.max(1),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
