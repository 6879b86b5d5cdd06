pub mod handlers;
pub mod params;
pub mod reports;
pub mod routes;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::reporting::Clock;
use crate::storage::Storage;

/// Full HTTP surface, mounted under `/api`
pub fn create_api_router(
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    cors: &CorsConfig,
) -> Router {
    Router::new()
        .nest("/api", routes::create_routes(storage, clock))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors))
}

fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE]);

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
