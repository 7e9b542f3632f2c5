// HTTP surface: read-only price queries + scrape status, and the separate
// bearer-protected ingest endpoint.

pub mod auth;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use ingest::IngestServer;
pub use server::{ApiServer, AppState};
