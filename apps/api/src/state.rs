use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::GenerationBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Generative backend. `GeminiClient` in production; tests swap in a stub.
    pub backend: Arc<dyn GenerationBackend>,
}
