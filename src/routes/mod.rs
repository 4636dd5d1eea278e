use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub mod api;
pub use api::api_routes;

use crate::utils::state::AppState;

pub fn make_app(state: AppState) -> Router {
    let app = Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    info!("Application initialized successfully");

    app
}
