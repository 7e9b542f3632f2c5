// API route configuration

use crate::api::{auth, handlers, ingest};
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::root))
        .route("/health", web::get().to(handlers::health_check))
        .route("/mandi", web::get().to(handlers::list_prices))
        .route("/regions", web::get().to(handlers::list_regions))
        .route("/markets", web::get().to(handlers::list_markets))
        .route("/scrape-status", web::get().to(handlers::scrape_status))
        // Names used by the first release of the API.
        .route("/states", web::get().to(handlers::list_regions))
        .route("/apmcs", web::get().to(handlers::list_markets));
}

/// Ingest process routes; only `/ingest` sits behind the bearer check.
pub fn configure_ingest_routes(cfg: &mut web::ServiceConfig, secret: String) {
    cfg.route("/", web::get().to(ingest::root)).service(
        web::resource("/ingest")
            .wrap(auth::Auth::new(secret))
            .route(web::post().to(ingest::ingest)),
    );
}
