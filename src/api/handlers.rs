use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::models::{
    CreateOrganisationRequest, MetricRecord, Organisation, UpdateOrganisationRequest,
};
use crate::reporting::{catalog, AggregationExecutor, Clock, ReportError};
use crate::storage::{Storage, StorageError};

use super::params::{parse_filter, QueryPairs};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct InsertResponse {
    pub inserted: u64,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a reporting failure onto a status. Store details are logged, never returned.
pub fn report_error(err: ReportError, context: &str) -> ApiError {
    match err {
        ReportError::Validation(message) => error_response(StatusCode::BAD_REQUEST, message),
        ReportError::UnknownReport(slug) => {
            error_response(StatusCode::NOT_FOUND, format!("Unknown report '{slug}'"))
        }
        ReportError::Overflow(column) => {
            tracing::error!(column = %column, "{context}: decimal overflow");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
        ReportError::Store(e) => {
            tracing::error!(error = %e, "{context}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
    }
}

fn internal_error(e: impl std::fmt::Display, context: &str) -> ApiError {
    tracing::error!(error = %e, "{context}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, context)
}

/// Register a new organisation
pub async fn create_organisation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrganisationRequest>,
) -> Result<(StatusCode, Json<Organisation>), ApiError> {
    if payload.organisation_id.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "organisation_id cannot be empty",
        ));
    }
    if payload.name.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "name cannot be empty"));
    }

    match state.storage.create_organisation(&payload).await {
        Ok(organisation) => Ok((StatusCode::CREATED, Json(organisation))),
        Err(StorageError::Conflict) => Err(error_response(
            StatusCode::CONFLICT,
            "Organisation already exists",
        )),
        Err(StorageError::Other(e)) => Err(internal_error(e, "Failed to create organisation")),
    }
}

/// Get an organisation by its external id
pub async fn get_organisation(
    State(state): State<Arc<AppState>>,
    Path(organisation_id): Path<String>,
) -> Result<Json<Organisation>, ApiError> {
    match state.storage.get_organisation(&organisation_id).await {
        Ok(Some(organisation)) => Ok(Json(organisation)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            "Organisation not found",
        )),
        Err(e) => Err(internal_error(e, "Failed to get organisation")),
    }
}

/// List organisations, newest first
pub async fn list_organisations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Organisation>>, ApiError> {
    let limit = query.limit.clamp(1, 1000);
    let offset = query.offset.max(0);

    match state.storage.list_organisations(limit, offset).await {
        Ok(organisations) => Ok(Json(organisations)),
        Err(e) => Err(internal_error(e, "Failed to list organisations")),
    }
}

pub async fn update_organisation(
    State(state): State<Arc<AppState>>,
    Path(organisation_id): Path<String>,
    Json(payload): Json<UpdateOrganisationRequest>,
) -> Result<Json<Organisation>, ApiError> {
    if payload
        .name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(error_response(StatusCode::BAD_REQUEST, "name cannot be empty"));
    }

    match state
        .storage
        .update_organisation(&organisation_id, &payload)
        .await
    {
        Ok(Some(organisation)) => Ok(Json(organisation)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            "Organisation not found",
        )),
        Err(e) => Err(internal_error(e, "Failed to update organisation")),
    }
}

/// Delete an organisation. Its metric rows are left in place.
pub async fn delete_organisation(
    State(state): State<Arc<AppState>>,
    Path(organisation_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    match state.storage.delete_organisation(&organisation_id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Organisation deleted successfully".to_string(),
        })),
        Ok(false) => Err(error_response(
            StatusCode::NOT_FOUND,
            "Organisation not found",
        )),
        Err(e) => Err(internal_error(e, "Failed to delete organisation")),
    }
}

/// Bulk insert metric records into one allow-listed table
pub async fn insert_records(
    State(state): State<Arc<AppState>>,
    Path((organisation_id, table_name)): Path<(String, String)>,
    Json(records): Json<Vec<MetricRecord>>,
) -> Result<(StatusCode, Json<InsertResponse>), ApiError> {
    let table = catalog::table(&table_name).map_err(|e| report_error(e, "Invalid table"))?;

    let prepared = records
        .iter()
        .map(|record| record.prepare(table))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| report_error(e, "Invalid record"))?;

    match state
        .storage
        .insert_metric_records(&organisation_id, table, &prepared)
        .await
    {
        Ok(inserted) => {
            tracing::info!(
                organisation_id = %organisation_id,
                table = table.name,
                inserted,
                "inserted metric records"
            );
            Ok((StatusCode::CREATED, Json(InsertResponse { inserted })))
        }
        Err(e) => Err(internal_error(e, "Failed to insert records")),
    }
}

/// Filtered raw rows of one allow-listed table, one JSON object per row
pub async fn table_rows(
    State(state): State<Arc<AppState>>,
    Path((organisation_id, table_name)): Path<(String, String)>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let context = "Failed to fetch table rows";
    let request =
        parse_filter(Some(&organisation_id), &pairs).map_err(|e| report_error(e, context))?;

    let executor = AggregationExecutor::new(state.storage.as_ref(), state.clock.as_ref());
    let (query, rows) = executor
        .table_rows(&table_name, &request)
        .await
        .map_err(|e| report_error(e, context))?;

    let rows = rows
        .into_iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert(
                "entry_date".to_string(),
                Value::String(row.entry_date.to_string()),
            );
            object.insert("shift".to_string(), row.shift.map_or(Value::Null, Value::from));
            for (column, value) in query.columns.iter().zip(row.values) {
                object.insert(column.to_string(), value.map_or(Value::Null, Value::String));
            }
            Value::Object(object)
        })
        .collect();

    Ok(Json(rows))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
