#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mandi_scraper::database_ops::{PriceStore, SqliteStore};
use mandi_scraper::extractor::{DiscoveryError, ExtractionError, RowExtractor};
use mandi_scraper::normalization::RawRow;

pub const TABLE: &str = "mandi_prices";

pub async fn memory_store() -> Arc<SqliteStore> {
    let store = SqliteStore::in_memory(TABLE).await.expect("in-memory sqlite");
    store.ensure_unique_index().await.expect("schema");
    Arc::new(store)
}

pub fn raw(market: &str, commodity: &str, modal: &str, date: &str) -> RawRow {
    RawRow {
        market: market.to_string(),
        commodity: commodity.to_string(),
        min_price: "1000".to_string(),
        modal_price: modal.to_string(),
        max_price: "3000".to_string(),
        arrival_volume: "12".to_string(),
        traded_volume: "10".to_string(),
        unit: "Quintal".to_string(),
        date: date.to_string(),
    }
}

/// What a scripted region does when extracted.
#[derive(Clone)]
pub enum Script {
    Rows(Vec<RawRow>),
    Fail,
    Panic,
    Hang,
}

/// In-process stand-in for the portal.
pub struct ScriptedExtractor {
    regions: Result<Vec<String>, ()>,
    scripts: HashMap<String, Script>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedExtractor {
    /// Regions are discovered in the order given.
    pub fn new<S: Into<String>>(scripts: Vec<(S, Script)>) -> Self {
        let scripts: Vec<(String, Script)> =
            scripts.into_iter().map(|(r, s)| (r.into(), s)).collect();
        Self {
            regions: Ok(scripts.iter().map(|(r, _)| r.clone()).collect()),
            scripts: scripts.into_iter().collect(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<(String, Script)>::new())
    }

    pub fn failing_discovery() -> Self {
        let mut extractor = Self::empty();
        extractor.regions = Err(());
        extractor
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RowExtractor for ScriptedExtractor {
    async fn discover_units(&self) -> Result<Vec<String>, DiscoveryError> {
        self.regions
            .clone()
            .map_err(|_| DiscoveryError::Browser("portal unreachable".to_string()))
    }

    async fn extract(&self, unit: &str) -> Result<Vec<RawRow>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.scripts.get(unit).cloned() {
            Some(Script::Rows(rows)) => Ok(rows),
            Some(Script::Fail) | None => {
                Err(ExtractionError::Browser(format!("{unit}: page crashed")))
            }
            Some(Script::Panic) => panic!("extractor blew up on {unit}"),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}
