// Standalone ingest endpoint: bearer-checked POST /ingest that echoes its payload.

use anyhow::Result;
use mandi_scraper::api::IngestServer;
use mandi_scraper::util::{env as env_util, tracing::init_tracing};

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("ingest_server", "info")?;

    let server = IngestServer::from_env()?;
    server.run().await
}
