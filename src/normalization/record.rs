use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::date::canonical_date;

/// Provenance stamped on every record.
pub const SOURCE_NAME: &str = "eNAM";

/// Cell count of a data row in the portal's price table. Header and
/// placeholder rows have a different count and are dropped.
pub const RAW_ROW_ARITY: usize = 10;

/// One table row as read off the page, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub market: String,
    pub commodity: String,
    pub min_price: String,
    pub modal_price: String,
    pub max_price: String,
    pub arrival_volume: String,
    pub traded_volume: String,
    pub unit: String,
    pub date: String,
}

impl RawRow {
    /// Validate arity and name the cells. The tenth column carries nothing
    /// we persist.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        if cells.len() != RAW_ROW_ARITY {
            return None;
        }
        let cell = |i: usize| cells[i].as_ref().trim().to_string();
        Some(Self {
            market: cell(0),
            commodity: cell(1),
            min_price: cell(2),
            modal_price: cell(3),
            max_price: cell(4),
            arrival_volume: cell(5),
            traded_volume: cell(6),
            unit: cell(7),
            date: cell(8),
        })
    }
}

/// Canonical price listing; `(region, market, commodity, date)` is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceRecord {
    pub region: String,
    pub market: String,
    pub commodity: String,
    pub min_price: String,
    pub modal_price: String,
    pub max_price: String,
    pub arrival_volume: String,
    pub traded_volume: String,
    pub unit: String,
    pub date: String,
    pub source_name: String,
    pub captured_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn key(&self) -> (&str, &str, &str, &str) {
        (&self.region, &self.market, &self.commodity, &self.date)
    }
}

/// Normalize a raw row captured now.
pub fn normalize(region: &str, raw: RawRow) -> PriceRecord {
    normalize_at(region, raw, Utc::now())
}

pub fn normalize_at(region: &str, raw: RawRow, captured_at: DateTime<Utc>) -> PriceRecord {
    PriceRecord {
        region: upper(region),
        market: upper(&raw.market),
        commodity: upper(&raw.commodity),
        min_price: raw.min_price,
        modal_price: raw.modal_price,
        max_price: raw.max_price,
        arrival_volume: raw.arrival_volume,
        traded_volume: raw.traded_volume,
        unit: raw.unit,
        date: canonical_date(&raw.date),
        source_name: SOURCE_NAME.to_string(),
        captured_at,
    }
}

fn upper(s: &str) -> String {
    s.trim().to_uppercase()
}
