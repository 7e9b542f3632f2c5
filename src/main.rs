use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mandi_scraper::api::{ApiServer, AppState};
use mandi_scraper::config::AppConfig;
use mandi_scraper::database_ops::{connect_store, PriceStore};
use mandi_scraper::extractor::{EnamExtractor, RowExtractor};
use mandi_scraper::orchestrator::ScrapeOrchestrator;
use mandi_scraper::progress::ProgressTracker;
use mandi_scraper::scheduler::Scheduler;
use mandi_scraper::util::{env as env_util, tracing::init_tracing};

/// eNAM mandi price scraper and query API.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape on a fixed interval in the background and serve the query API (default).
    Serve,
    /// Run a single scrape and exit.
    ScrapeOnce,
    /// List the regions currently offered by the portal.
    Regions,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("mandi_scraper", "info,sqlx=warn")?;

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    let extractor: Arc<dyn RowExtractor> = Arc::new(EnamExtractor::new(config.portal.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Regions => {
            let regions = extractor
                .discover_units()
                .await
                .context("region discovery failed")?;
            for region in regions {
                println!("{region}");
            }
        }
        Command::ScrapeOnce => {
            let store = open_store(&config).await?;
            let progress = Arc::new(ProgressTracker::new());
            let orchestrator =
                ScrapeOrchestrator::new(extractor, store, progress, config.scrape.clone().into());
            let summary = orchestrator
                .run_once()
                .await
                .context("region discovery failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Serve => {
            let store = open_store(&config).await?;
            let progress = Arc::new(ProgressTracker::new());
            let orchestrator = Arc::new(ScrapeOrchestrator::new(
                extractor,
                store.clone(),
                progress.clone(),
                config.scrape.clone().into(),
            ));
            // Scraping runs on its own task so the API answers during a run.
            let scheduler = Scheduler::new(orchestrator, progress.clone(), &config.scrape);
            tokio::spawn(scheduler.run_forever());

            ApiServer::new(&config.api)
                .run(AppState { store, progress })
                .await?;
        }
    }
    Ok(())
}

/// Connect and make sure the unique key is enforced; without it the service
/// cannot guarantee one row per key, so startup stops here.
async fn open_store(config: &AppConfig) -> Result<Arc<dyn PriceStore>> {
    let store = connect_store(&config.store)
        .await
        .context("price store connection failed")?;
    store
        .ensure_unique_index()
        .await
        .context("cannot enforce the (region, market, commodity, date) unique index")?;
    info!(table = %config.store.table, "price store ready");
    Ok(store)
}
