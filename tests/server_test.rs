mod common;

use common::{context, FakeCube, ScriptedModel};
use muni_budget::server::handle_request;
use serde_json::{json, Value};
use std::sync::Arc;

const INTENT: &str = r#"{"endpoint": "facts", "cuts": [{"dimension": "demarcation.code", "value": "JHB"}]}"#;

fn get(path: &str) -> String {
    format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path)
}

fn post(path: &str, body: &str) -> String {
    format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        path,
        body.len(),
        body
    )
}

fn body(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap()
}

#[tokio::test]
async fn test_preflight_and_unknown_route() {
    let ctx = context(Arc::new(ScriptedModel::default()), Arc::new(FakeCube::new()));

    let preflight = handle_request(&ctx, "OPTIONS /api/query HTTP/1.1\r\n\r\n").await;
    assert_eq!(preflight.status, 204);
    assert!(preflight.body.is_empty());

    let missing = handle_request(&ctx, &get("/api/nope")).await;
    assert_eq!(missing.status, 404);

    let garbage = handle_request(&ctx, "").await;
    assert_eq!(garbage.status, 400);
}

#[tokio::test]
async fn test_health_and_reference_tables() {
    let ctx = context(Arc::new(ScriptedModel::default()), Arc::new(FakeCube::new()));

    let health = handle_request(&ctx, &get("/api/health")).await;
    assert_eq!(health.status, 200);
    assert_eq!(body(&health.body)["status"], "ok");

    let municipalities = handle_request(&ctx, &get("/api/municipalities")).await;
    assert_eq!(municipalities.status, 200);
    assert_eq!(body(&municipalities.body)["municipalities"]["CPT"], "City of Cape Town");

    let amount_types = handle_request(&ctx, &get("/api/amount-types/")).await;
    assert_eq!(amount_types.status, 200);
    assert_eq!(body(&amount_types.body)["amount_types"]["ORGB"], "Original Budget");
}

#[tokio::test]
async fn test_available_items_lists_catalog() {
    let ctx = context(Arc::new(ScriptedModel::default()), Arc::new(FakeCube::new()));
    let response = handle_request(&ctx, &get("/api/available-items")).await;
    assert_eq!(response.status, 200);

    let items = body(&response.body)["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], json!({"code": "0100", "label": "Property rates"}));

    let ctx = context(Arc::new(ScriptedModel::default()), Arc::new(FakeCube::without_catalog()));
    let response = handle_request(&ctx, &get("/api/available-items")).await;
    assert_eq!(response.status, 500);
}

#[tokio::test]
async fn test_query_requires_user_request() {
    let ctx = context(Arc::new(ScriptedModel::new(INTENT, "[]")), Arc::new(FakeCube::new()));

    for payload in ["{}", "{\"user_request\": \"   \"}", "not json"] {
        let response = handle_request(&ctx, &post("/api/query", payload)).await;
        assert_eq!(response.status, 400, "payload {}", payload);
        assert_eq!(body(&response.body), json!({"error": "user_request missing"}));
    }
}

#[tokio::test]
async fn test_query_success_returns_api_json() {
    let cube = Arc::new(FakeCube::new());
    let ctx = context(Arc::new(ScriptedModel::new(INTENT, "[]")), cube.clone());

    let response = handle_request(
        &ctx,
        &post("/api/query", r#"{"user_request": "Johannesburg spending in 2021"}"#),
    )
    .await;

    assert_eq!(response.status, 200);
    let url = body(&response.body)["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("https://municipaldata.treasury.gov.za/api/cubes/incexp/facts?"));
    assert!(url.contains("cut=demarcation.code:\"JHB\"|financial_year_end.year:2021"));
    assert_eq!(cube.requested().last(), Some(&url));
}

#[tokio::test]
async fn test_query_failure_is_500_with_message() {
    let ctx = context(Arc::new(ScriptedModel::new("no idea", "[]")), Arc::new(FakeCube::new()));

    let response = handle_request(&ctx, &post("/api/query", r#"{"user_request": "hello"}"#)).await;
    assert_eq!(response.status, 500);
    assert_eq!(
        body(&response.body)["error"],
        "Model output could not be parsed into JSON."
    );
}

#[tokio::test]
async fn test_municipality_data_validation() {
    let ctx = context(Arc::new(ScriptedModel::default()), Arc::new(FakeCube::new()));

    let response = handle_request(&ctx, &get("/api/municipality-data?year=2020")).await;
    assert_eq!(response.status, 400);

    let response = handle_request(&ctx, &get("/api/municipality-data?municipality=CPT&year=twenty")).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_municipality_data_sorted_and_labelled() {
    let cube = Arc::new(FakeCube {
        cells: json!([
            {"item.code": "0100", "amount.sum": 1500.5},
            {"item.code": "0200", "amount.sum": 1234567.891},
            {"item.code": "0400", "amount.sum": 0}
        ]),
        ..FakeCube::new()
    });
    let ctx = context(Arc::new(ScriptedModel::default()), cube.clone());

    let response = handle_request(
        &ctx,
        &get("/api/municipality-data?municipality=CPT&year=2020&item_codes=0100,%220200%22"),
    )
    .await;
    assert_eq!(response.status, 200);

    let cells = body(&response.body)["cells"].as_array().unwrap().clone();
    assert_eq!(cells[0]["item.code"], "0200");
    assert_eq!(cells[0]["amount_formatted"], "R 1,234,567.89");
    assert_eq!(cells[1]["amount_formatted"], "R 1,500.50");
    assert!(cells[2].get("amount_formatted").is_none());
    assert!(cells.iter().all(|c| c["municipality_name"] == "City of Cape Town"));

    let requested = cube.requested();
    let url = requested.last().unwrap();
    assert!(url.contains("aggregates=amount.sum"));
    assert!(url.contains("pagesize=10000"));
    assert!(url.contains("amount_type.code%3AAUDA"));
}

#[tokio::test]
async fn test_municipality_data_upstream_error_is_400() {
    let cube = Arc::new(FakeCube {
        fail_queries: true,
        ..FakeCube::new()
    });
    let ctx = context(Arc::new(ScriptedModel::default()), cube);

    let response = handle_request(&ctx, &get("/api/municipality-data?municipality=CPT&year=2020")).await;
    assert_eq!(response.status, 400);
    assert!(body(&response.body)["error"].as_str().unwrap().contains("bad cut"));
}

#[tokio::test]
async fn test_forecast_route_errors() {
    let ctx = context(Arc::new(ScriptedModel::with_forecast("[]")), Arc::new(FakeCube::new()));

    let response = handle_request(&ctx, &post("/api/forecast", "not json")).await;
    assert_eq!(response.status, 400);

    let response = handle_request(&ctx, &post("/api/forecast", r#"{"other": []}"#)).await;
    assert_eq!(response.status, 400);
    assert_eq!(body(&response.body)["error"], "nl_data missing");

    let response = handle_request(&ctx, &post("/api/forecast", r#"{"nl_data": []}"#)).await;
    assert_eq!(response.status, 500);
    assert_eq!(body(&response.body)["error"], "No data provided for forecasting");
}

#[tokio::test]
async fn test_forecast_route_success() {
    let answer = r#"[{"sector_or_item": "Health", "forecast": 10, "allocation": 60}, {"item": "Roads", "forecast": 5, "allocation": 40}]"#;
    let ctx = context(Arc::new(ScriptedModel::with_forecast(answer)), Arc::new(FakeCube::new()));

    let response = handle_request(
        &ctx,
        &post(
            "/api/forecast",
            r#"{"nl_data": [{"item.label": "Health", "amount.sum": 9}], "budget_total": 100}"#,
        ),
    )
    .await;
    assert_eq!(response.status, 200);

    let report = body(&response.body);
    assert_eq!(report["forecast"][0]["sector_or_item"], "Health");
    assert_eq!(report["forecast"][1]["item"], "Roads");
    assert_eq!(report["allocated_total"], 100.0);
    assert_eq!(report["budget_total"], 100.0);
    // Health is below its default floor; Water and Education are missing
    assert_eq!(report["shortfalls"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_forecast_route_accepts_loosely_typed_answer_and_budget() {
    let answer = "```json\n[{\"sector\": \"Health\", \"forecast\": \"2100000000\", \"allocation\": \"2500000000\"}, {\"sector\": \"Water\", \"allocation\": 1000000000}]\n```";
    let ctx = context(Arc::new(ScriptedModel::with_forecast(answer)), Arc::new(FakeCube::new()));

    let response = handle_request(
        &ctx,
        &post(
            "/api/forecast",
            r#"{"nl_data": [{"item.label": "Health", "amount.sum": 9}], "budget_total": "3.5e9"}"#,
        ),
    )
    .await;
    assert_eq!(response.status, 200);

    let report = body(&response.body);
    assert_eq!(report["forecast"][0]["forecast"], "2100000000");
    assert!(report["forecast"][1].get("forecast").is_none());
    assert_eq!(report["allocated_total"], 3_500_000_000.0);
    assert_eq!(report["budget_total"], 3_500_000_000.0);
    assert_eq!(report["shortfalls"][0]["sector"], "Education");
    assert_eq!(report["shortfalls"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_forecast_route_rejects_unreadable_budget_total() {
    let model = Arc::new(ScriptedModel::with_forecast("[]"));
    let ctx = context(model.clone(), Arc::new(FakeCube::new()));

    let response = handle_request(
        &ctx,
        &post(
            "/api/forecast",
            r#"{"nl_data": [{"item.label": "Health", "amount.sum": 9}], "budget_total": "plenty"}"#,
        ),
    )
    .await;
    assert_eq!(response.status, 400);
    assert!(model.prompts().is_empty());
}
