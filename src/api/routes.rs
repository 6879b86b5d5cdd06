use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::reporting::Clock;
use crate::storage::Storage;

use super::handlers::{
    create_organisation, delete_organisation, get_organisation, health_check, insert_records,
    list_organisations, table_rows, update_organisation, AppState,
};
use super::reports::{organisation_report, organisation_summary, report, report_summary};

pub fn create_routes(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Router {
    let state = Arc::new(AppState { storage, clock });

    let organisation_routes = Router::new()
        .route(
            "/organisations",
            post(create_organisation).get(list_organisations),
        )
        .route(
            "/organisations/{organisation_id}",
            get(get_organisation)
                .put(update_organisation)
                .delete(delete_organisation),
        )
        .route(
            "/organisations/{organisation_id}/tables/{table}/records",
            post(insert_records),
        )
        .route(
            "/organisations/{organisation_id}/tables/{table}/rows",
            get(table_rows),
        );

    let report_routes = Router::new()
        .route(
            "/organisations/{organisation_id}/reports/{report}",
            get(organisation_report),
        )
        .route(
            "/organisations/{organisation_id}/reports/{report}/summary",
            get(organisation_summary),
        )
        .route("/reports/{report}", get(report))
        .route("/reports/{report}/summary", get(report_summary));

    Router::new()
        .route("/health", get(health_check))
        .merge(organisation_routes)
        .merge(report_routes)
        .with_state(state)
}
