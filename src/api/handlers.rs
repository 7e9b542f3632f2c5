// HTTP request handlers for the price query service

use crate::api::models::*;
use crate::api::server::AppState;
use crate::database_ops::{PersistenceError, PriceFilter};
use actix_web::{web, HttpResponse, Result};

fn store_failure(op: &str, err: PersistenceError) -> HttpResponse {
    tracing::error!(op, error = %err, "price store query failed");
    HttpResponse::InternalServerError().json(ApiResponse::<()>::error("price store unavailable"))
}

pub async fn root() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Mandi Price API running".to_string(),
    }))
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let database = if state.store.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
        scrape_running: state.progress.snapshot().running,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// `GET /mandi?region=&market=&commodity=`
pub async fn list_prices(
    query: web::Query<PriceFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    tracing::debug!(
        region = ?query.region,
        market = ?query.market,
        commodity = ?query.commodity,
        "price query"
    );

    match state.store.query(&query).await {
        Ok(records) if records.is_empty() => Ok(HttpResponse::Ok().json(NoDataResponse::new())),
        Ok(records) => Ok(HttpResponse::Ok().json(records)),
        Err(e) => Ok(store_failure("query", e)),
    }
}

/// `GET /regions`
pub async fn list_regions(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.store.distinct_regions().await {
        Ok(regions) => Ok(HttpResponse::Ok().json(regions)),
        Err(e) => Ok(store_failure("distinct_regions", e)),
    }
}

/// `GET /markets?region=X`
pub async fn list_markets(
    query: web::Query<MarketsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(region) = query.region() else {
        return Ok(HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "query parameter `region` is required",
        )));
    };
    match state.store.distinct_markets(region).await {
        Ok(markets) => Ok(HttpResponse::Ok().json(markets)),
        Err(e) => Ok(store_failure("distinct_markets", e)),
    }
}

/// `GET /scrape-status`
pub async fn scrape_status(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.progress.snapshot()))
}
