//! Static process-start configuration, read once from the environment.

use crate::util::env::{db_url, env_flag, env_opt, env_parse};
use anyhow::Result;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_PORTAL_URL: &str = "https://enam.gov.in/web/trading-details";
pub const DEFAULT_PRICE_TABLE: &str = "mandi_prices";
pub const DEFAULT_WORKERS: usize = 6;
pub const DEFAULT_INTERVAL_SECS: u64 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub store: StoreConfig,
    pub scrape: ScrapeConfig,
    pub api: ApiConfig,
}

/// Browser session knobs for the eNAM portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub url: String,
    pub nav_timeout: Duration,
    pub select_timeout: Duration,
    pub row_timeout: Duration,
    /// Fixed pause after navigation and after each dropdown change.
    pub settle: Duration,
    pub chrome_path: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            nav_timeout: Duration::from_secs(60),
            select_timeout: Duration::from_secs(30),
            row_timeout: Duration::from_secs(20),
            settle: Duration::from_millis(2000),
            chrome_path: None,
        }
    }
}

#[derive(Clone)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
    pub table: String,
}

// The URL may embed credentials.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = self.url.split(':').next().unwrap_or_default();
        f.debug_struct("StoreConfig")
            .field("url", &format_args!("{scheme}:<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("table", &self.table)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub workers: usize,
    pub interval: Duration,
    pub run_on_start: bool,
    /// Ceiling on one region's whole extraction.
    pub unit_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            run_on_start: true,
            unit_timeout: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = PortalConfig::default();
        let portal = PortalConfig {
            url: env_opt("ENAM_URL").unwrap_or(defaults.url),
            nav_timeout: Duration::from_secs(env_parse("NAV_TIMEOUT_SECS", 60u64)),
            select_timeout: Duration::from_secs(env_parse("SELECT_TIMEOUT_SECS", 30u64)),
            row_timeout: Duration::from_secs(env_parse("ROW_TIMEOUT_SECS", 20u64)),
            settle: Duration::from_millis(env_parse("SETTLE_MS", 2000u64)),
            chrome_path: env_opt("CHROME_PATH"),
        };

        let store = StoreConfig {
            url: db_url()?,
            max_connections: env_parse("DB_MAX_CONNS", 10u32).max(1),
            table: env_opt("PRICE_TABLE").unwrap_or_else(|| DEFAULT_PRICE_TABLE.to_string()),
        };

        let scrape = ScrapeConfig {
            workers: env_parse("SCRAPE_WORKERS", DEFAULT_WORKERS).max(1),
            interval: Duration::from_secs(env_parse("SCRAPE_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)),
            run_on_start: env_flag("SCRAPE_ON_START", true),
            unit_timeout: Duration::from_secs(env_parse("UNIT_TIMEOUT_SECS", 900u64)),
        };

        let api = ApiConfig {
            host: env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("API_PORT", 8000u16),
            allowed_origins: env_opt("ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()),
        };

        Ok(Self {
            portal,
            store,
            scrape,
            api,
        })
    }
}
