//! OpenAI-compatible chat-completions provider.
//!
//! Talks to any endpoint that speaks the `/chat/completions` wire format
//! (OpenAI itself, Azure-style proxies, local gateways) over plain
//! `reqwest`, with SSE streaming decoded by `eventsource-stream`.

pub mod streaming;
pub mod types;

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};

use avazon_core::llm::provider::{LlmEventStream, LlmProvider};
use avazon_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, StopReason,
};

use self::streaming::{map_finish_reason, map_sse_stream, map_usage};
use self::types::{
    ChatFunction, ChatFunctionCall, ChatMessage, ChatRequest, ChatResponse, ChatTool, ChatToolCall,
    ErrorEnvelope, StreamOptions,
};

/// Provider for any OpenAI-compatible API.
///
/// Does NOT derive Debug so the API key cannot end up in logs.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    provider_name: String,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            provider_name: provider_name.into(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        })
    }

    /// The default model used when a request leaves `model` empty.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn bearer(&self) -> Result<HeaderValue, LlmError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret()))
            .map_err(|_| LlmError::AuthenticationFailed)?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Build the wire request from a generic [`CompletionRequest`].
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        ChatRequest {
            model,
            messages: request.messages.iter().map(to_chat_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: request
                .tools
                .iter()
                .map(|tool| ChatTool {
                    kind: "function",
                    function: ChatFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }
}

fn to_chat_message(message: &Message) -> ChatMessage {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };
    ChatMessage {
        role,
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| ChatToolCall {
                id: call.id.clone(),
                kind: "function".to_string(),
                function: ChatFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// POST a chat request and turn non-2xx answers into [`LlmError`]s.
async fn send(
    client: &reqwest::Client,
    url: &str,
    auth: HeaderValue,
    body: &ChatRequest,
) -> Result<reqwest::Response, LlmError> {
    let response = client
        .post(url)
        .header(AUTHORIZATION, auth)
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Provider {
            message: format!("HTTP request failed: {e}"),
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(map_status_error(status.as_u16(), retry_after.as_deref(), &body))
}

/// Map an HTTP error status and body to an [`LlmError`].
pub(crate) fn map_status_error(status: u16, retry_after: Option<&str>, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| body.to_string());
    let code = parsed.as_ref().and_then(|e| e.error.code.as_deref());

    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64),
        },
        503 | 529 => LlmError::Overloaded(message),
        400 if code == Some("context_length_exceeded") || message.contains("maximum context length") => {
            LlmError::ContextLengthExceeded { max: 0, requested: 0 }
        }
        400 | 404 | 422 => LlmError::InvalidRequest(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

fn into_completion(response: ChatResponse) -> CompletionResponse {
    let choice = response.choices.into_iter().next();
    let stop_reason = choice
        .as_ref()
        .and_then(|c| c.finish_reason.as_deref())
        .map(map_finish_reason)
        .unwrap_or(StopReason::EndTurn);
    let content = choice.and_then(|c| c.message.content).unwrap_or_default();

    CompletionResponse {
        id: response.id,
        content,
        model: response.model,
        stop_reason,
        usage: response.usage.map(map_usage).unwrap_or_default(),
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(request, false);
        let response = send(&self.client, &self.url(), self.bearer()?, &body).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;
        Ok(into_completion(parsed))
    }

    fn stream(&self, request: CompletionRequest) -> LlmEventStream {
        let body = self.build_request(&request, true);
        let client = self.client.clone();
        let url = self.url();
        let auth = self.bearer();

        let payloads = async_stream::try_stream! {
            let response = send(&client, &url, auth?, &body).await?;
            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
                yield event.data;
            }
        };
        map_sse_stream(payloads)
    }
}
