use std::sync::Arc;

use crate::core::config::Config;
use crate::rag::RagSystem;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rag: Arc<RagSystem>,
}

impl AppState {
    pub fn new(config: Config, rag: RagSystem) -> Self {
        Self {
            config: Arc::new(config),
            rag: Arc::new(rag),
        }
    }
}
