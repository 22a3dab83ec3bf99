//! OpenAI SSE chunks to [`StreamEvent`] adapter.
//!
//! Tool calls are keyed by their `index`. The first chunk for an index
//! carries the call id and function name and becomes a
//! [`StreamEvent::ToolCallStart`]; later chunks carry argument fragments and
//! become [`StreamEvent::ToolCallDelta`]s. Fragments that arrive before the
//! function name is known are held back until the call starts.

use std::collections::HashMap;

use futures_util::{Stream, StreamExt};

use avazon_core::llm::provider::LlmEventStream;
use avazon_types::llm::{LlmError, StopReason, StreamEvent, Usage};

use super::types::{ChatChunk, ChatUsage, ErrorEnvelope};

/// Sentinel data payload that ends an OpenAI stream.
const DONE_MARKER: &str = "[DONE]";

#[derive(Default)]
struct ToolCallState {
    started: bool,
    id: Option<String>,
    pending_arguments: String,
}

/// Stateful chunk-to-event mapper for one streamed completion.
#[derive(Default)]
pub(crate) struct ChunkMapper {
    tool_calls: HashMap<u32, ToolCallState>,
}

impl ChunkMapper {
    pub(crate) fn map(&mut self, chunk: ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextDelta { index: 0, text });
            }

            for call in choice.delta.tool_calls {
                let state = self.tool_calls.entry(call.index).or_default();
                if let Some(id) = call.id.filter(|id| !id.is_empty()) {
                    state.id = Some(id);
                }
                let (name, arguments) = match call.function {
                    Some(f) => (f.name.filter(|n| !n.is_empty()), f.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };

                if !state.started {
                    state.pending_arguments.push_str(&arguments);
                    let Some(name) = name else { continue };
                    state.started = true;
                    let id = state
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("call_{}", call.index));
                    events.push(StreamEvent::ToolCallStart {
                        index: call.index,
                        id,
                        name,
                    });
                    let pending = std::mem::take(&mut state.pending_arguments);
                    if !pending.is_empty() {
                        events.push(StreamEvent::ToolCallDelta {
                            index: call.index,
                            arguments: pending,
                        });
                    }
                } else if !arguments.is_empty() {
                    events.push(StreamEvent::ToolCallDelta {
                        index: call.index,
                        arguments,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::MessageDelta {
                    stop_reason: map_finish_reason(&reason),
                });
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Usage(map_usage(usage)));
        }

        events
    }
}

pub(crate) fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    }
}

pub(crate) fn map_usage(usage: ChatUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

/// Map a stream of SSE `data:` payloads to [`StreamEvent`]s.
///
/// Emits `Connected` first and `Done` last. The stream ends at the
/// `[DONE]` sentinel or when the connection closes.
pub fn map_sse_stream<S>(payloads: S) -> LlmEventStream
where
    S: Stream<Item = Result<String, LlmError>> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut mapper = ChunkMapper::default();
        let mut payloads = Box::pin(payloads);

        while let Some(payload) = payloads.next().await {
            let payload = payload?;
            let data = payload.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_MARKER {
                break;
            }
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
                Err::<(), _>(LlmError::Provider { message: envelope.error.message })?;
            }

            let chunk: ChatChunk = serde_json::from_str(data)
                .map_err(|e| LlmError::Deserialization(format!("stream chunk: {e}")))?;
            for event in mapper.map(chunk) {
                yield event;
            }
        }

        yield StreamEvent::Done;
    })
}
