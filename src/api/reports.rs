//! Chart and summary report handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::reporting::{catalog, AggregationBucket, AggregationExecutor, SummaryResult};

use super::handlers::{report_error, ApiError, AppState};
use super::params::{parse_filter, QueryPairs};

async fn chart(
    state: &AppState,
    slug: &str,
    organisation_id: Option<&str>,
    pairs: &[(String, String)],
) -> Result<Json<Vec<AggregationBucket>>, ApiError> {
    let report = catalog::report(slug).map_err(|e| report_error(e, "Unknown report"))?;
    let context = format!("Failed to load {} report", report.title);

    let request = parse_filter(organisation_id, pairs).map_err(|e| report_error(e, &context))?;
    let executor = AggregationExecutor::new(state.storage.as_ref(), state.clock.as_ref());
    let result = executor
        .run_report(report, &request)
        .await
        .map_err(|e| report_error(e, &context))?;

    Ok(Json(result.buckets))
}

async fn summary(
    state: &AppState,
    slug: &str,
    organisation_id: Option<&str>,
    pairs: &[(String, String)],
) -> Result<Json<SummaryResult>, ApiError> {
    let summary = catalog::summary(slug).map_err(|e| report_error(e, "Unknown report"))?;
    let context = format!("Failed to load {}", summary.title);

    let request = parse_filter(organisation_id, pairs).map_err(|e| report_error(e, &context))?;
    let executor = AggregationExecutor::new(state.storage.as_ref(), state.clock.as_ref());
    let result = executor
        .run_summary(summary, &request)
        .await
        .map_err(|e| report_error(e, &context))?;

    Ok(Json(result))
}

/// `GET /organisations/{organisation_id}/reports/{report}`
pub async fn organisation_report(
    State(state): State<Arc<AppState>>,
    Path((organisation_id, slug)): Path<(String, String)>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<Vec<AggregationBucket>>, ApiError> {
    chart(&state, &slug, Some(&organisation_id), &pairs).await
}

/// `GET /organisations/{organisation_id}/reports/{report}/summary`
pub async fn organisation_summary(
    State(state): State<Arc<AppState>>,
    Path((organisation_id, slug)): Path<(String, String)>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<SummaryResult>, ApiError> {
    summary(&state, &slug, Some(&organisation_id), &pairs).await
}

/// `GET /reports/{report}?organisation_id=...`
pub async fn report(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<Vec<AggregationBucket>>, ApiError> {
    chart(&state, &slug, None, &pairs).await
}

/// `GET /reports/{report}/summary?organisation_id=...`
pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<SummaryResult>, ApiError> {
    summary(&state, &slug, None, &pairs).await
}
