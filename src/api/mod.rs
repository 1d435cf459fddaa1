mod handlers;
pub mod middleware;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use middleware::{auth_middleware, SecurityConfig};

/// Router with security settings from the environment.
pub fn create_router(db: Database) -> Router {
    create_router_with_security(db, SecurityConfig::from_env())
}

pub fn create_router_with_security(db: Database, security: SecurityConfig) -> Router {
    let api = Router::new()
        // Tracking records
        .route("/records", post(handlers::create_record))
        .route("/records/{entity_type}", get(handlers::list_records))
        .route(
            "/records/{entity_type}/{key}",
            get(handlers::get_record).delete(handlers::delete_record),
        )
        // Work items
        .route("/work-items", get(handlers::list_work_items))
        .route("/work-items/{name}", get(handlers::get_work_item))
        .route("/work-items/{name}/publishes", get(handlers::list_publishes))
        .route("/work-items/{name}/snapshots", get(handlers::list_snapshots))
        .route("/work-items/{name}/renders", get(handlers::list_renders))
        .route_layer(axum::middleware::from_fn_with_state(
            security.clone(),
            auth_middleware,
        ))
        // Health stays open for probes
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&security)),
        )
        .with_state(db)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    match &security.cors_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    }
}
