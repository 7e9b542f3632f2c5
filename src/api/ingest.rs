// Ingest boundary: a standalone process that accepts an authenticated JSON
// payload and echoes it back. It shares nothing with the scraper beyond the
// HTTP plumbing.

use crate::api::{middleware, models::IngestAccepted, routes};
use crate::util::env::{env_opt, env_parse, env_req};
use actix_web::{web, App, HttpResponse, HttpServer, Result};
use anyhow::Context;

pub struct IngestServer {
    pub host: String,
    pub port: u16,
    api_key: String,
}

impl IngestServer {
    /// Create server from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env_opt("INGEST_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_parse("INGEST_PORT", 10000u16);
        let api_key =
            env_req("INGEST_API_KEY").context("INGEST_API_KEY environment variable is required")?;
        Ok(Self {
            host,
            port,
            api_key,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        tracing::info!(host = %self.host, port = %self.port, "Starting ingest server");

        let api_key = self.api_key;
        HttpServer::new(move || {
            let (logger, _) = middleware::setup_middleware();
            let api_key = api_key.clone();
            App::new()
                .wrap(logger)
                .configure(move |cfg| routes::configure_ingest_routes(cfg, api_key))
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;
        Ok(())
    }
}

pub async fn root() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().body("Backend is running"))
}

/// `POST /ingest` (behind [`crate::api::auth::Auth`]).
pub async fn ingest(payload: web::Json<serde_json::Value>) -> Result<HttpResponse> {
    let data = payload.into_inner();
    tracing::info!(bytes = data.to_string().len(), "ingest payload accepted");
    Ok(HttpResponse::Ok().json(IngestAccepted {
        message: "Data received successfully".to_string(),
        data,
    }))
}
