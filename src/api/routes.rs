use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers::{self, AppState};
use crate::store::ArtifactStore;

pub fn create_router<S: ArtifactStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalogs
        .route("/modifiers", get(handlers::list_modifiers::<S>))
        .route("/templates", get(handlers::list_templates::<S>))
        // Artifacts
        .route(
            "/artifacts",
            get(handlers::list_artifacts::<S>).post(handlers::create_artifact::<S>),
        )
        .route(
            "/artifacts/:id",
            get(handlers::get_artifact::<S>).delete(handlers::delete_artifact::<S>),
        )
        .route(
            "/artifacts/:id/operations",
            post(handlers::apply_operation::<S>),
        )
        .route(
            "/artifacts/:id/instances/:unique_id",
            get(handlers::get_instance_view::<S>),
        )
        .layer(CorsLayer::permissive())
}
