//! Integration tests for the storage backends
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests
//! - By default, both backends are tested; PostgreSQL tests are skipped unless
//!   `DATABASE_URL` points at a reachable PostgreSQL server.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use spindle::models::{CreateOrganisationRequest, MetricRecord, UpdateOrganisationRequest};
use spindle::reporting::catalog::{PRODUCTION_EFFICIENCY, SUMMARIES};
use spindle::reporting::{
    AggregationExecutor, FilterRequest, FixedClock, SystemClock,
};
use spindle::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true,
    }
}

async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

/// Organisation id that will not collide with earlier runs against a shared database
fn unique_org(prefix: &str) -> String {
    format!("{prefix}{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn org_request(organisation_id: &str) -> CreateOrganisationRequest {
    CreateOrganisationRequest {
        organisation_id: organisation_id.to_string(),
        name: "Test Mill".to_string(),
        address: None,
    }
}

async fn concurrent_creation(storage: Arc<dyn Storage>) {
    let organisation_id = unique_org("ORG");
    let mut handles = vec![];

    for _ in 0..10 {
        let storage_clone = Arc::clone(&storage);
        let request = org_request(&organisation_id);
        handles.push(tokio::spawn(async move {
            storage_clone.create_organisation(&request).await
        }));
    }

    let mut success_count = 0;
    let mut conflict_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one creation should succeed");
    assert_eq!(conflict_count, 9, "All others should get conflict");
}

#[tokio::test]
async fn test_concurrent_organisation_creation_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    concurrent_creation(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_organisation_creation_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    concurrent_creation(storage).await;
}

async fn organisation_updates(storage: Arc<dyn Storage>) {
    let organisation_id = unique_org("UPD");
    storage
        .create_organisation(&CreateOrganisationRequest {
            address: Some("Mill Road".to_string()),
            ..org_request(&organisation_id)
        })
        .await
        .unwrap();

    // Fields left out of the update keep their values
    let updated = storage
        .update_organisation(
            &organisation_id,
            &UpdateOrganisationRequest {
                is_active: Some(false),
                ..UpdateOrganisationRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Test Mill");
    assert_eq!(updated.address.as_deref(), Some("Mill Road"));
    assert!(!updated.is_active);

    assert!(storage.delete_organisation(&organisation_id).await.unwrap());
    assert!(storage.get_organisation(&organisation_id).await.unwrap().is_none());
    assert!(storage
        .update_organisation(&organisation_id, &UpdateOrganisationRequest::default())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_organisation_updates_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    organisation_updates(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_organisation_updates_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    organisation_updates(storage).await;
}

async fn shift_split_report(storage: Arc<dyn Storage>) {
    let organisation_id = unique_org("EFF");
    let records: Vec<MetricRecord> = serde_json::from_value(json!([
        {"entry_date": "2024-06-03", "shift": 1, "values": {"efficiency_pct": "92.5", "actual_kg": 120}},
        {"entry_date": "2024-06-03", "shift": 2, "values": {"efficiency_pct": "87.5", "actual_kg": 100}},
        {"entry_date": "2024-06-04", "shift": 3, "values": {"efficiency_pct": "-", "actual_kg": 90}}
    ]))
    .unwrap();
    let prepared: Vec<_> = records
        .iter()
        .map(|record| record.prepare(&PRODUCTION_EFFICIENCY).unwrap())
        .collect();
    let inserted = storage
        .insert_metric_records(&organisation_id, &PRODUCTION_EFFICIENCY, &prepared)
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    let executor = AggregationExecutor::new(storage.as_ref(), &clock);
    let report = spindle::reporting::catalog::report("production-efficiency").unwrap();

    // Calendar Q2 is Apr-Jun for this report.
    let request = FilterRequest {
        years: vec![2024],
        quarters: vec![2],
        ..FilterRequest::new(organisation_id.as_str())
    };
    let result = executor.run_report(report, &request).await.unwrap();

    assert_eq!(result.buckets.len(), 1);
    let bucket = &result.buckets[0];
    assert_eq!(bucket.label, "Jun 2024");
    assert_eq!(bucket.metric("efficiency"), Some("90".parse().unwrap()));
    assert_eq!(bucket.metric("efficiency_shift1"), Some("92.5".parse().unwrap()));
    assert_eq!(bucket.metric("efficiency_shift3"), None);
    assert_eq!(bucket.metric("actual_kg_shift3"), Some("90".parse().unwrap()));
    assert_eq!(bucket.metric("actual_kg"), Some("310".parse().unwrap()));
}

#[tokio::test]
async fn test_shift_split_report_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    shift_split_report(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_shift_split_report_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    shift_split_report(storage).await;
}

#[tokio::test]
async fn test_deleting_organisation_keeps_metric_rows() {
    let storage = create_sqlite_storage().await;
    storage.create_organisation(&org_request("UNI0024")).await.unwrap();

    let record: MetricRecord = serde_json::from_value(json!({
        "entry_date": "2024-06-01",
        "values": {"cotton_issued_kg": 100, "yarn_produced_kg": 80}
    }))
    .unwrap();
    let summary = &SUMMARIES[0];
    storage
        .insert_metric_records(
            "UNI0024",
            summary.table,
            &[record.prepare(summary.table).unwrap()],
        )
        .await
        .unwrap();
    assert!(storage.delete_organisation("UNI0024").await.unwrap());

    let clock = SystemClock::new(0);
    let executor = AggregationExecutor::new(storage.as_ref(), &clock);
    let request = FilterRequest {
        years: vec![2024],
        ..FilterRequest::new("UNI0024")
    };
    let result = executor.run_summary(summary, &request).await.unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.percentages["yarn_produced_kg"], "80.00");
}
