//! Row extraction boundary: turns a region into raw table rows.
//!
//! The orchestrator only ever sees [`RowExtractor`]; the browser-backed
//! implementation lives in [`enam`] and tests substitute scripted fakes.

pub mod enam;
pub mod errors;

use async_trait::async_trait;

use crate::normalization::RawRow;

pub use enam::EnamExtractor;
pub use errors::{DiscoveryError, ExtractionError};

#[async_trait]
pub trait RowExtractor: Send + Sync {
    /// Enumerate the units of work (regions) currently listed on the portal.
    async fn discover_units(&self) -> Result<Vec<String>, DiscoveryError>;

    /// Extract every row for one region.
    ///
    /// A failing sub-market is skipped inside the implementation; rows already
    /// gathered from its siblings are still returned. `Err` means the region
    /// could not be opened at all.
    async fn extract(&self, unit: &str) -> Result<Vec<RawRow>, ExtractionError>;
}

/// Trim option labels, drop blanks and placeholders, and de-duplicate while
/// keeping the portal's order.
pub fn clean_labels<I>(labels: I, placeholders: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.trim();
        if label.is_empty() || placeholders.iter().any(|p| p.eq_ignore_ascii_case(label)) {
            continue;
        }
        if !out.iter().any(|seen| seen == label) {
            out.push(label.to_string());
        }
    }
    out
}
