pub mod health;
pub mod optimize;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let outputs = ServeDir::new(&state.config.output_dir);

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/optimize",
            post(optimize::handle_optimize).layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest_service("/outputs", outputs)
        .with_state(state)
}
