mod common;

use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use common::{memory_store, raw};
use mandi_scraper::api::{routes, AppState};
use mandi_scraper::database_ops::PriceStore;
use mandi_scraper::normalization::normalize;
use mandi_scraper::progress::ProgressTracker;
use serde_json::{json, Value};

async fn seeded_state() -> AppState {
    let store: Arc<dyn PriceStore> = memory_store().await;
    for (region, market, commodity) in [
        ("Punjab", "Khanna", "Wheat"),
        ("Punjab", "Rajpura", "Wheat"),
        ("Haryana", "Karnal", "Paddy-Basmati"),
    ] {
        store
            .upsert(&normalize(region, raw(market, commodity, "2100", "2024-01-05")))
            .await
            .unwrap();
    }
    AppState {
        store,
        progress: Arc::new(ProgressTracker::new()),
    }
}

macro_rules! query_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn mandi_returns_filtered_records() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get()
        .uri("/mandi?region=punjab&commodity=whe")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let rows = body.as_array().expect("list of records");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["region"] == "PUNJAB"));
    assert_eq!(rows[0]["market"], "KHANNA");
    assert_eq!(rows[0]["source_name"], "eNAM");
}

#[actix_web::test]
async fn mandi_accepts_legacy_parameter_names() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get()
        .uri("/mandi?state=Punjab&apmc=Rajpura")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn new_parameter_names_win_over_legacy_ones() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get()
        .uri("/mandi?region=PUNJAB&state=HARYANA")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let rows = body.as_array().expect("list of records");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["region"] == "PUNJAB"));

    let req = test::TestRequest::get()
        .uri("/markets?region=Haryana&state=Punjab")
        .to_request();
    let markets: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(markets, json!(["KARNAL"]));
}

#[actix_web::test]
async fn mandi_without_matches_returns_no_data_sentinel() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get().uri("/mandi?commodity=RICE").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    assert_eq!(body, json!({ "status": "no_data" }));

    let req = test::TestRequest::get().uri("/mandi?region=Kerala").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "no_data");
}

#[actix_web::test]
async fn regions_and_markets_are_sorted() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get().uri("/regions").to_request();
    let regions: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(regions, json!(["HARYANA", "PUNJAB"]));

    let req = test::TestRequest::get().uri("/markets?region=Punjab").to_request();
    let markets: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(markets, json!(["KHANNA", "RAJPURA"]));

    let req = test::TestRequest::get().uri("/apmcs?state=haryana").to_request();
    let legacy: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(legacy, json!(["KARNAL"]));
}

#[actix_web::test]
async fn markets_requires_a_region() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get().uri("/markets").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn scrape_status_reports_live_progress() {
    let state = seeded_state().await;
    let progress = state.progress.clone();
    progress.begin_run(4);
    progress.record_unit_completion(10);
    let app = query_app!(state);

    let req = test::TestRequest::get().uri("/scrape-status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["running"], true);
    assert_eq!(body["total_units"], 4);
    assert_eq!(body["completed_units"], 1);
    assert_eq!(body["total_records"], 10);
    assert_eq!(body["percentage"], 25.0);
    assert!(body["last_run_started_at"].is_string());
}

#[actix_web::test]
async fn health_reports_database_and_scrape_state() {
    let app = query_app!(seeded_state().await);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "connected");
    assert_eq!(body["data"]["scrape_running"], false);
}

#[actix_web::test]
async fn ingest_rejects_missing_or_wrong_token() {
    let app = test::init_service(
        App::new().configure(|cfg| routes::configure_ingest_routes(cfg, "s3cret".to_string())),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ingest")
        .set_json(json!({ "rows": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let req = test::TestRequest::post()
        .uri("/ingest")
        .insert_header(("Authorization", "Bearer nope"))
        .set_json(json!({ "rows": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn ingest_echoes_authorized_payload() {
    let app = test::init_service(
        App::new().configure(|cfg| routes::configure_ingest_routes(cfg, "s3cret".to_string())),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let banner = test::call_and_read_body(&app, req).await;
    assert_eq!(banner, "Backend is running");

    let payload = json!({ "region": "PUNJAB", "rows": [1, 2, 3] });
    let req = test::TestRequest::post()
        .uri("/ingest")
        .insert_header(("Authorization", "Bearer s3cret"))
        .set_json(&payload)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        body,
        json!({ "message": "Data received successfully", "data": payload })
    );
}
