//! Headless-browser extractor for the eNAM "trading details" page.
//!
//! Each call owns a fresh Chromium process so that workers never share page
//! state. Every interaction with the page is bounded: navigation by
//! `nav_timeout`, dropdown population by `select_timeout`, table rows by
//! `row_timeout`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{clean_labels, DiscoveryError, ExtractionError, RowExtractor};
use crate::config::PortalConfig;
use crate::normalization::RawRow;

const STATE_SELECT: &str = "#min_max_state";
const MARKET_SELECT: &str = "#min_max_apmc";
const COMMODITY_SELECT: &str = "#min_max_commodity";
const REFRESH_BUTTON: &str = "#today_mandi_refresh";
const TABLE_ROWS: &str = "#mandi_table tr";

/// Value of the "all commodities" entry in the commodity dropdown.
const ALL_COMMODITIES: &str = "0";

const STATE_PLACEHOLDERS: &[&str] = &["Select State", "--All--"];
const MARKET_PLACEHOLDERS: &[&str] = &["Select APMC", "--All--"];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct EnamExtractor {
    config: PortalConfig,
}

impl EnamExtractor {
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }

    async fn list_states(&self, session: &BrowserSession) -> Result<Vec<String>, ExtractionError> {
        let page = session.open(&self.config.url, self.config.nav_timeout).await?;
        tokio::time::sleep(self.config.settle).await;
        wait_until(
            &page,
            &options_loaded_js(STATE_SELECT),
            "state list",
            self.config.select_timeout,
        )
        .await?;
        let labels: Vec<String> = eval(&page, &option_labels_js(STATE_SELECT)).await?;
        Ok(clean_labels(labels, STATE_PLACEHOLDERS))
    }

    async fn scrape_state(
        &self,
        session: &BrowserSession,
        state: &str,
    ) -> Result<Vec<RawRow>, ExtractionError> {
        let page = session.open(&self.config.url, self.config.nav_timeout).await?;
        tokio::time::sleep(self.config.settle).await;

        select_option(&page, STATE_SELECT, state, self.config.select_timeout).await?;
        tokio::time::sleep(self.config.settle).await;
        wait_until(
            &page,
            &options_loaded_js(MARKET_SELECT),
            "market list",
            self.config.select_timeout,
        )
        .await?;
        let markets = clean_labels(
            eval::<Vec<String>>(&page, &option_labels_js(MARKET_SELECT)).await?,
            MARKET_PLACEHOLDERS,
        );
        debug!(state, markets = markets.len(), "markets listed");

        let mut rows = Vec::new();
        for market in &markets {
            match self.scrape_market(&page, market).await {
                Ok(mut found) => {
                    debug!(state, market = %market, rows = found.len(), "market scraped");
                    rows.append(&mut found);
                }
                // Siblings keep going; rows gathered so far are kept.
                Err(e) => warn!(
                    state,
                    market = %market,
                    timeout = e.is_timeout(),
                    error = %e,
                    "market skipped"
                ),
            }
        }
        Ok(rows)
    }

    async fn scrape_market(&self, page: &Page, market: &str) -> Result<Vec<RawRow>, ExtractionError> {
        select_option(page, MARKET_SELECT, market, self.config.select_timeout).await?;
        set_select_value(page, COMMODITY_SELECT, ALL_COMMODITIES).await?;

        // Drop the previous market's rows so the wait below sees fresh data only.
        let clicked: bool = eval(page, &refresh_table_js()).await?;
        if !clicked {
            return Err(ExtractionError::Browser(format!(
                "{REFRESH_BUTTON} not found"
            )));
        }
        wait_until(page, &rows_present_js(), "price table", self.config.row_timeout).await?;

        let cells: Vec<Vec<String>> = eval(page, &row_cells_js()).await?;
        let total = cells.len();
        let rows: Vec<RawRow> = cells
            .iter()
            .filter_map(|c| RawRow::from_cells(c.as_slice()))
            .collect();
        if rows.len() < total {
            debug!(market, dropped = total - rows.len(), "rows with unexpected cell count dropped");
        }
        Ok(rows)
    }
}

#[async_trait]
impl RowExtractor for EnamExtractor {
    async fn discover_units(&self) -> Result<Vec<String>, DiscoveryError> {
        let session = BrowserSession::launch(&self.config).await?;
        let result = self.list_states(&session).await;
        session.close().await;
        let states = result?;
        info!(states = states.len(), "regions discovered");
        Ok(states)
    }

    async fn extract(&self, unit: &str) -> Result<Vec<RawRow>, ExtractionError> {
        let started = Instant::now();
        let session = BrowserSession::launch(&self.config).await?;
        let result = self.scrape_state(&session, unit).await;
        session.close().await;
        if let Ok(rows) = &result {
            info!(
                state = unit,
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "state extracted"
            );
        }
        result
    }
}

/// A Chromium process plus the task pumping its CDP event stream.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: &PortalConfig) -> Result<Self, ExtractionError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(config.nav_timeout);
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(ExtractionError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self { browser, handler })
    }

    async fn open(&self, url: &str, limit: Duration) -> Result<Page, ExtractionError> {
        tokio::time::timeout(limit, self.browser.new_page(url))
            .await
            .map_err(|_| ExtractionError::Timeout {
                operation: "portal navigation",
                after: limit,
            })?
            .map_err(ExtractionError::from)
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

async fn eval<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T, ExtractionError> {
    let result = page.evaluate_expression(script.to_string()).await?;
    Ok(result.into_value::<T>()?)
}

async fn wait_until(
    page: &Page,
    predicate: &str,
    operation: &'static str,
    limit: Duration,
) -> Result<(), ExtractionError> {
    tokio::time::timeout(limit, poll_until(page, predicate))
        .await
        .map_err(|_| ExtractionError::Timeout {
            operation,
            after: limit,
        })?
}

async fn poll_until(page: &Page, predicate: &str) -> Result<(), ExtractionError> {
    loop {
        if eval::<bool>(page, predicate).await? {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Pick `label` in `select`, waiting for it to be listed first.
async fn select_option(
    page: &Page,
    select: &'static str,
    label: &str,
    limit: Duration,
) -> Result<(), ExtractionError> {
    let script = select_by_label_js(select, label)?;
    wait_until(page, &script, "dropdown selection", limit).await
}

async fn set_select_value(
    page: &Page,
    select: &'static str,
    value: &str,
) -> Result<(), ExtractionError> {
    let ok: bool = eval(page, &select_by_value_js(select, value)?).await?;
    if ok {
        Ok(())
    } else {
        Err(ExtractionError::OptionMissing {
            select,
            label: value.to_string(),
        })
    }
}

fn options_loaded_js(select: &str) -> String {
    format!(
        "(() => {{ const s = document.querySelector('{select}'); return !!s && s.options.length > 1; }})()"
    )
}

fn option_labels_js(select: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll('{select} option')).map(o => (o.label || o.textContent || '').trim())"
    )
}

fn select_by_label_js(select: &str, label: &str) -> Result<String, serde_json::Error> {
    let want = serde_json::to_string(label)?;
    Ok(format!(
        r#"(() => {{
  const s = document.querySelector('{select}');
  if (!s) return false;
  const o = Array.from(s.options).find(o => (o.label || o.textContent || '').trim() === {want});
  if (!o) return false;
  s.value = o.value;
  s.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#
    ))
}

fn select_by_value_js(select: &str, value: &str) -> Result<String, serde_json::Error> {
    let want = serde_json::to_string(value)?;
    Ok(format!(
        r#"(() => {{
  const s = document.querySelector('{select}');
  if (!s || !Array.from(s.options).some(o => o.value === {want})) return false;
  s.value = {want};
  s.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#
    ))
}

fn refresh_table_js() -> String {
    format!(
        r#"(() => {{
  document.querySelectorAll('{TABLE_ROWS}').forEach(r => {{ if (r.querySelector('td')) r.remove(); }});
  const b = document.querySelector('{REFRESH_BUTTON}');
  if (!b) return false;
  b.click();
  return true;
}})()"#
    )
}

fn rows_present_js() -> String {
    format!("document.querySelectorAll('{TABLE_ROWS} td').length > 0")
}

fn row_cells_js() -> String {
    format!(
        "Array.from(document.querySelectorAll('{TABLE_ROWS}')).map(r => Array.from(r.querySelectorAll('td')).map(td => (td.innerText || '').trim()))"
    )
}
