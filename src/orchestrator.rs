//! One scrape run: discover regions, fan them out over a bounded worker pool,
//! then sweep every normalized record into the store.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::ScrapeConfig;
use crate::database_ops::PriceStore;
use crate::extractor::{DiscoveryError, RowExtractor};
use crate::normalization::{normalize, PriceRecord, RawRow};
use crate::progress::ProgressTracker;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Units extracted at the same time.
    pub workers: usize,
    /// Ceiling on a single unit; hitting it counts the unit as failed.
    pub unit_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        ScrapeConfig::default().into()
    }
}

impl From<ScrapeConfig> for OrchestratorSettings {
    fn from(cfg: ScrapeConfig) -> Self {
        Self {
            workers: cfg.workers.max(1),
            unit_timeout: cfg.unit_timeout,
        }
    }
}

/// What one worker hands back. Failures are data here, never panics or
/// errors crossing the pool boundary.
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit: String,
    pub rows: Vec<RawRow>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub units: usize,
    pub failed_units: usize,
    pub records: usize,
    pub upserted: usize,
    pub upsert_failures: usize,
    pub elapsed_ms: u64,
}

pub struct ScrapeOrchestrator {
    extractor: Arc<dyn RowExtractor>,
    store: Arc<dyn PriceStore>,
    progress: Arc<ProgressTracker>,
    settings: OrchestratorSettings,
}

impl ScrapeOrchestrator {
    pub fn new(
        extractor: Arc<dyn RowExtractor>,
        store: Arc<dyn PriceStore>,
        progress: Arc<ProgressTracker>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            extractor,
            store,
            progress,
            settings,
        }
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Run discovery -> extract -> normalize -> persist once.
    ///
    /// A discovery failure ends the run before any progress is touched and is
    /// returned to the caller; an empty region list is a no-op run. Everything
    /// after discovery is absorbed into the summary.
    pub async fn run_once(&self) -> Result<RunSummary, DiscoveryError> {
        let started = Instant::now();
        info!("scrape run started");

        let units = match self.extractor.discover_units().await {
            Ok(units) => units,
            Err(e) => {
                self.progress.end_run();
                return Err(e);
            }
        };
        if units.is_empty() {
            warn!("no regions discovered; skipping run");
            self.progress.end_run();
            return Ok(RunSummary {
                elapsed_ms: elapsed_ms(started),
                ..RunSummary::default()
            });
        }

        self.progress.begin_run(units.len());
        let mut summary = RunSummary {
            units: units.len(),
            ..RunSummary::default()
        };

        let records = self.extract_all(units, &mut summary).await;
        summary.records = records.len();

        let (upserted, failures) = self.sweep(records).await;
        summary.upserted = upserted;
        summary.upsert_failures = failures;

        self.progress.end_run();
        summary.elapsed_ms = elapsed_ms(started);
        info!(
            units = summary.units,
            failed_units = summary.failed_units,
            records = summary.records,
            upserted = summary.upserted,
            upsert_failures = summary.upsert_failures,
            elapsed_ms = summary.elapsed_ms,
            "scrape run completed"
        );
        Ok(summary)
    }

    /// Keep at most `workers` units in flight; refill a slot as each one
    /// finishes. Returns only once every unit has completed.
    async fn extract_all(&self, units: Vec<String>, summary: &mut RunSummary) -> Vec<PriceRecord> {
        let mut pending = units.into_iter();
        let mut in_flight: JoinSet<UnitOutcome> = JoinSet::new();
        let mut records = Vec::new();

        loop {
            while in_flight.len() < self.settings.workers {
                let Some(unit) = pending.next() else { break };
                in_flight.spawn(scrape_unit(
                    self.extractor.clone(),
                    unit,
                    self.settings.unit_timeout,
                ));
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let outcome = match joined {
                Ok(outcome) => outcome,
                // scrape_unit catches panics itself; this is a cancelled task.
                Err(join_err) => {
                    error!(error = %join_err, "worker task lost");
                    UnitOutcome {
                        unit: String::from("<unknown>"),
                        rows: Vec::new(),
                        error: Some(join_err.to_string()),
                    }
                }
            };

            if outcome.error.is_some() {
                summary.failed_units += 1;
            }
            let before = records.len();
            records.extend(outcome.rows.into_iter().map(|row| normalize(&outcome.unit, row)));
            self.progress.record_unit_completion(records.len() - before);
        }
        records
    }

    /// Upsert every record, tolerating individual failures. Each upsert
    /// future owns its record and store handle.
    async fn sweep(&self, records: Vec<PriceRecord>) -> (usize, usize) {
        let results: Vec<bool> = stream::iter(records)
            .map(|record| {
                let store = self.store.clone();
                async move {
                    match store.upsert(&record).await {
                        Ok(()) => true,
                        Err(e) => {
                            let (region, market, commodity, date) = record.key();
                            warn!(region, market, commodity, date, error = %e, "upsert failed; record dropped");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.settings.workers)
            .collect()
            .await;
        let ok = results.iter().filter(|ok| **ok).count();
        (ok, results.len() - ok)
    }
}

/// One worker: extract a unit under its timeout, converting every failure
/// mode (error, timeout, panic) into an outcome with zero rows.
async fn scrape_unit(extractor: Arc<dyn RowExtractor>, unit: String, limit: Duration) -> UnitOutcome {
    let started = Instant::now();
    let attempt = AssertUnwindSafe(tokio::time::timeout(limit, extractor.extract(&unit)))
        .catch_unwind()
        .await;

    let (rows, error) = match attempt {
        Ok(Ok(Ok(rows))) => (rows, None),
        Ok(Ok(Err(e))) => {
            warn!(region = %unit, error = %e, "region extraction failed");
            (Vec::new(), Some(e.to_string()))
        }
        Ok(Err(_elapsed)) => {
            warn!(region = %unit, timeout_secs = limit.as_secs(), "region extraction timed out");
            (Vec::new(), Some(format!("timed out after {limit:?}")))
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!(region = %unit, panic = %msg, "region worker panicked");
            (Vec::new(), Some(format!("panicked: {msg}")))
        }
    };
    info!(
        region = %unit,
        rows = rows.len(),
        failed = error.is_some(),
        elapsed_ms = elapsed_ms(started),
        "region finished"
    );
    UnitOutcome { unit, rows, error }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
