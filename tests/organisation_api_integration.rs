//! Integration tests for organisation management, metric ingest and raw rows

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use spindle::config::CorsConfig;
use spindle::reporting::FixedClock;
use spindle::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use tower::ServiceExt;

async fn create_test_app() -> Router {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);
    let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()));
    spindle::api::create_api_router(storage, clock, &CorsConfig::default())
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app().await;
    let (status, json) = call(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "OK"}));
}

#[tokio::test]
async fn test_organisation_lifecycle() {
    let app = create_test_app().await;

    let (status, created) = call(
        &app,
        "POST",
        "/api/organisations",
        Some(json!({"organisation_id": "UNI0024", "name": "Unit 24", "address": "Mill Road"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["organisation_id"], "UNI0024");
    assert_eq!(created["is_active"], true);

    let (status, _) = call(
        &app,
        "POST",
        "/api/organisations",
        Some(json!({"organisation_id": "UNI0024", "name": "Duplicate"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, fetched) = call(&app, "GET", "/api/organisations/UNI0024", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Unit 24");

    let (status, updated) = call(
        &app,
        "PUT",
        "/api/organisations/UNI0024",
        Some(json!({"name": "Unit 24 Spinning", "is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Unit 24 Spinning");
    assert_eq!(updated["address"], "Mill Road");
    assert_eq!(updated["is_active"], false);

    let (status, listed) = call(&app, "GET", "/api/organisations?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "DELETE", "/api/organisations/UNI0024", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", "/api/organisations/UNI0024", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "DELETE", "/api/organisations/UNI0024", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(
        &app,
        "PUT",
        "/api/organisations/UNI0024",
        Some(json!({"name": "Ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_organisation_rejects_blank_fields() {
    let app = create_test_app().await;

    let (status, json) = call(
        &app,
        "POST",
        "/api/organisations",
        Some(json!({"organisation_id": "  ", "name": "Unit"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "organisation_id cannot be empty");

    let (status, _) = call(
        &app,
        "POST",
        "/api/organisations",
        Some(json!({"organisation_id": "UNI0024", "name": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_rejects_unknown_table_and_columns() {
    let app = create_test_app().await;

    let (status, json) = call(
        &app,
        "POST",
        "/api/organisations/UNI0024/tables/users/records",
        Some(json!([{"entry_date": "2024-01-01", "values": {}}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("unknown table"));

    let (status, json) = call(
        &app,
        "POST",
        "/api/organisations/UNI0024/tables/yarn_realisation/records",
        Some(json!([{"entry_date": "2024-01-01", "values": {"id; DROP TABLE x": 1}}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("unknown column"));

    let (status, _) = call(
        &app,
        "POST",
        "/api/organisations/UNI0024/tables/yarn_realisation/records",
        Some(json!([{"entry_date": "2024-01-01", "shift": 7, "values": {}}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_table_rows_returns_filtered_raw_values() {
    let app = create_test_app().await;

    let (status, json) = call(
        &app,
        "POST",
        "/api/organisations/UNI0024/tables/unit_per_kg/records",
        Some(json!([
            {"entry_date": "2024-02-01", "shift": 1, "values": {"ukg": "3.1", "units_consumed": 310}},
            {"entry_date": "2024-02-01", "shift": 2, "values": {"ukg": "N/A"}},
            {"entry_date": "2024-03-01", "shift": 1, "values": {"ukg": 2.9}}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json, json!({"inserted": 3}));

    let (status, rows) = call(
        &app,
        "GET",
        "/api/organisations/UNI0024/tables/unit_per_kg/rows?date=2024-02-01",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        rows,
        json!([
            {"entry_date": "2024-02-01", "shift": 1, "units_consumed": "310", "production_kg": null, "ukg": "3.1"},
            {"entry_date": "2024-02-01", "shift": 2, "units_consumed": null, "production_kg": null, "ukg": "N/A"}
        ])
    );

    let (status, _) = call(
        &app,
        "GET",
        "/api/organisations/UNI0024/tables/organisations/rows",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
