//! Persistence gateway for price records.
//!
//! Both backends keep one table keyed by a unique index on
//! `(region, market, commodity, date)`; upserts go through
//! `INSERT .. ON CONFLICT .. DO UPDATE` so the database, not the caller,
//! settles races between workers writing the same key.

pub mod db;
pub mod sqlite_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::config::StoreConfig;
use crate::normalization::PriceRecord;

pub use db::Db;
pub use sqlite_store::SqliteStore;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid table name {0:?}; use ASCII letters, digits and '_'")]
    InvalidTable(String),
    #[error("unsupported database URL scheme {0:?}")]
    UnsupportedScheme(String),
}

/// Optional query filters. Values are matched against upper-cased columns, so
/// callers may pass any case.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "FilterParams")]
pub struct PriceFilter {
    pub region: Option<String>,
    pub market: Option<String>,
    /// Substring match.
    pub commodity: Option<String>,
}

/// Query-string shape. `state` and `apmc` are the first release's names;
/// when both spellings are sent, `region` and `market` win.
#[derive(Deserialize)]
struct FilterParams {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    market: Option<String>,
    #[serde(default)]
    apmc: Option<String>,
    #[serde(default)]
    commodity: Option<String>,
}

impl From<FilterParams> for PriceFilter {
    fn from(p: FilterParams) -> Self {
        Self {
            region: present(p.region).or_else(|| present(p.state)),
            market: present(p.market).or_else(|| present(p.apmc)),
            commodity: p.commodity,
        }
    }
}

fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl PriceFilter {
    /// Blank values are dropped, the rest upper-cased.
    pub fn normalized(&self) -> Self {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_uppercase)
        }
        Self {
            region: clean(&self.region),
            market: clean(&self.market),
            commodity: clean(&self.commodity),
        }
    }
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Create the table and its unique key index if missing. Idempotent.
    async fn ensure_unique_index(&self) -> Result<(), PersistenceError>;

    /// Insert, or replace every non-key column of the row with the same key.
    async fn upsert(&self, record: &PriceRecord) -> Result<(), PersistenceError>;

    /// Filtered listing, ordered by key. Empty when nothing matches.
    async fn query(&self, filter: &PriceFilter) -> Result<Vec<PriceRecord>, PersistenceError>;

    /// Sorted distinct regions.
    async fn distinct_regions(&self) -> Result<Vec<String>, PersistenceError>;

    /// Sorted distinct markets of one region (case-insensitive region match).
    async fn distinct_markets(&self, region: &str) -> Result<Vec<String>, PersistenceError>;

    async fn ping(&self) -> bool;
}

/// Open the backend selected by the URL scheme.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn PriceStore>, PersistenceError> {
    let scheme = config.url.split(':').next().unwrap_or_default();
    let store: Arc<dyn PriceStore> = match scheme {
        "postgres" | "postgresql" => {
            Arc::new(Db::connect(&config.url, config.max_connections, &config.table).await?)
        }
        "sqlite" => Arc::new(
            SqliteStore::connect(&config.url, config.max_connections, &config.table).await?,
        ),
        other => return Err(PersistenceError::UnsupportedScheme(other.to_string())),
    };
    info!(backend = scheme, table = %config.table, "price store connected");
    Ok(store)
}

pub(crate) const COLUMNS: &str = "region, market, commodity, min_price, modal_price, max_price, \
     arrival_volume, traded_volume, unit, date, source_name, captured_at";

pub(crate) const KEY_COLUMNS: &str = "region, market, commodity, date";

/// `SET` list replacing every non-key column from the conflicting insert.
pub(crate) const UPDATE_NON_KEY: &str = "min_price = EXCLUDED.min_price, \
     modal_price = EXCLUDED.modal_price, \
     max_price = EXCLUDED.max_price, \
     arrival_volume = EXCLUDED.arrival_volume, \
     traded_volume = EXCLUDED.traded_volume, \
     unit = EXCLUDED.unit, \
     source_name = EXCLUDED.source_name, \
     captured_at = EXCLUDED.captured_at";

/// Table names are spliced into SQL text, so only plain identifiers pass.
pub(crate) fn checked_table(name: &str) -> Result<String, PersistenceError> {
    let ok = !name.is_empty()
        && name.len() <= 63
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(name.to_string())
    } else {
        Err(PersistenceError::InvalidTable(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> PriceFilter {
        serde_json::from_value(serde_json::Value::Object(
            query
                .split('&')
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        ))
        .unwrap()
    }

    #[test]
    fn legacy_names_fill_in_for_missing_new_names() {
        let f = parse("state=Punjab&apmc=Khanna");
        assert_eq!(f.region.as_deref(), Some("Punjab"));
        assert_eq!(f.market.as_deref(), Some("Khanna"));
        assert_eq!(f.commodity, None);
    }

    #[test]
    fn new_names_win_over_legacy_names() {
        let f = parse("region=PUNJAB&state=HARYANA&apmc=Karnal&market=Khanna");
        assert_eq!(f.region.as_deref(), Some("PUNJAB"));
        assert_eq!(f.market.as_deref(), Some("Khanna"));
    }

    #[test]
    fn table_names_are_plain_identifiers() {
        assert!(checked_table("mandi_prices").is_ok());
        assert!(checked_table("prices2024").is_ok());
        assert!(checked_table("").is_err());
        assert!(checked_table("1prices").is_err());
        assert!(checked_table("prices; DROP TABLE x").is_err());
        assert!(checked_table("mandi-prices").is_err());
    }

    #[test]
    fn filter_normalization_uppercases_and_drops_blanks() {
        let f = PriceFilter {
            region: Some(" punjab ".into()),
            market: Some("  ".into()),
            commodity: Some("whe".into()),
        }
        .normalized();
        assert_eq!(f.region.as_deref(), Some("PUNJAB"));
        assert_eq!(f.market, None);
        assert_eq!(f.commodity.as_deref(), Some("WHE"));
    }
}
