//! LlmProvider trait definition.
//!
//! This is the core abstraction every chat-completion backend implements.
//! Uses RPITIT for `complete`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use avazon_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

/// A boxed stream of provider events.
pub type LlmEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for chat-completion backends (OpenAI-compatible endpoints, fakes in tests).
///
/// Implementations live in avazon-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    fn stream(&self, request: CompletionRequest) -> LlmEventStream;
}
