use async_trait::async_trait;

use super::types::{MessagesRequest, ModelResponse};
use crate::core::errors::ApiError;

/// Seam between the generator and a concrete model API, so tests can script
/// responses without network access.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn messages(&self, request: &MessagesRequest) -> Result<ModelResponse, ApiError>;
}
