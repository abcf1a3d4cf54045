use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use anyhow::Result;
use async_trait::async_trait;
use market_harvest::web::{AppState, routes};
use market_harvest::{ListingRecord, QueryConfig, Reporter, Scrape, SessionOutcome};
use serde_json::{Value, json};

/// Returns one row per config, echoing the city.
struct Echo;

#[async_trait]
impl Scrape for Echo {
    async fn scrape(&self, config: &QueryConfig, reporter: &Reporter) -> Result<SessionOutcome> {
        reporter.status(format!("echo {}", config.city()));
        Ok(SessionOutcome {
            rows: vec![ListingRecord {
                title: format!("{} listing", config.product()),
                price: Some(5.0),
                price_raw: Some("$5".into()),
                location: config.city().to_string(),
                url: "https://market.example/item/1".into(),
            }],
            raw_item_count: 1,
        })
    }
}

fn state() -> web::Data<AppState> {
    web::Data::new(AppState::new(Arc::new(Echo)))
}

fn form(city: &str, min: u32, max: u32) -> Value {
    json!({
        "city": city,
        "product": "bike",
        "min_price": min,
        "max_price": max,
        "region_code": "112",
        "match_exact": true
    })
}

#[actix_web::test]
async fn add_list_and_remove_configs() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;

    for city in ["Austin", "Dallas", "Houston"] {
        let req = test::TestRequest::post()
            .uri("/api/configs")
            .set_json(form(city, 0, 100))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::delete().uri("/api/configs/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let cities: Vec<_> = body["configs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["city"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(cities, vec!["Austin", "Houston"]);
    assert_eq!(body["configs"][1]["index"], 1);
}

#[actix_web::test]
async fn invalid_form_is_rejected() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/configs")
        .set_json(form("Austin", 500, 10))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("greater than"));

    let req = test::TestRequest::post()
        .uri("/api/configs")
        .set_json(form("", 0, 10))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::delete().uri("/api/configs/0").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn malformed_prices_get_a_json_error() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;

    for (min, max) in [(json!(""), json!(100)), (json!(1.5), json!(100))] {
        let mut body = form("Austin", 0, 100);
        body["min_price"] = min;
        body["max_price"] = max;
        let req = test::TestRequest::post()
            .uri("/api/configs")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    let req = test::TestRequest::get().uri("/api/configs").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["configs"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn run_with_empty_batch_is_a_bad_request() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let req = test::TestRequest::post().uri("/api/run").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn run_then_fetch_and_download() {
    let data = state();
    let app = test::init_service(App::new().app_data(data.clone()).configure(routes)).await;

    let req = test::TestRequest::get().uri("/api/results/download").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    for city in ["Austin", "Dallas"] {
        let req = test::TestRequest::post()
            .uri("/api/configs")
            .set_json(form(city, 0, 100))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::post().uri("/api/run").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["summary"]["configs"], 2);
    assert_eq!(body["rows"].as_array().unwrap().len(), 2);
    assert_eq!(body["rows"][1]["location"], "Dallas");
    assert!(!data.is_running());

    let req = test::TestRequest::get().uri("/api/results").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["summary"]["rows"], 2);

    let req = test::TestRequest::get().uri("/api/results/download").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/zip"
    );
    let bytes = test::read_body(resp).await;
    let zip = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(zip.len(), 3);
}

#[actix_web::test]
async fn second_run_while_busy_conflicts() {
    let data = state();
    let app = test::init_service(App::new().app_data(data.clone()).configure(routes)).await;
    let _held = data.begin_run().unwrap();

    let req = test::TestRequest::post().uri("/api/run").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn stream_reports_progress_and_done() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let req = test::TestRequest::post()
        .uri("/api/configs")
        .set_json(form("Austin", 0, 100))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/run/stream").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();

    assert!(body.starts_with("event: start\n"));
    assert!(body.contains("event: progress\ndata: {\"kind\":\"status\",\"message\":\"echo Austin\"}"));
    assert!(body.contains("event: config\n"));
    assert!(body.contains("event: done\n"));
}

#[actix_web::test]
async fn health_and_dashboard() {
    let app = test::init_service(App::new().app_data(state()).configure(routes)).await;
    let req = test::TestRequest::get().uri("/healthz").to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "ok");

    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert!(String::from_utf8_lossy(&body).contains("Scrape Data"));
}
