pub mod codes;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod redemption;
pub mod resolver;
pub mod scans;
pub mod util;
