use async_trait::async_trait;

use crate::{
    conversation::{Conversation, ModelTurn},
    error::SignalError,
};

/// One model round trip. Implemented by the Gemini client and mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, conversation: &Conversation) -> Result<ModelTurn, SignalError>;
}
