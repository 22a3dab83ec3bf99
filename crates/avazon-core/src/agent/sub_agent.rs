//! Conversational sub-agent with tool support and streamed exchanges.
//!
//! A `SubAgent` owns one conversation history (system prompt in slot 0) and
//! the tool specs it may call. `handle_async` starts a streaming exchange on
//! a spawned task and hands back an [`AgentExchange`]: an output channel of
//! text chunks and tool invocations, and a terminal result that resolves
//! exactly once after the output channel has closed.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, info_span};

use avazon_types::llm::{
    CompletionRequest, LlmError, Message, MessageRole, StreamEvent, ToolInvocation, ToolSpec,
};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmEventStream;

const OUTPUT_BUFFER: usize = 64;

/// One inbound turn for [`SubAgent::handle_async`].
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurn {
    /// A plain message. Empty text appends nothing and just re-prompts.
    Message { role: MessageRole, text: String },
    /// The answer to a function call the model requested.
    ToolResult {
        ack: String,
        invocation: ToolInvocation,
    },
}

impl AgentTurn {
    pub fn user(text: impl Into<String>) -> Self {
        AgentTurn::Message {
            role: MessageRole::User,
            text: text.into(),
        }
    }
}

/// One item on an exchange's output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    Text(String),
    ToolInvocation { id: String, name: String },
}

impl AgentOutput {
    /// Wire form sent to clients: the chunk itself, or `function:{"id","name"}`.
    pub fn encode(&self) -> String {
        match self {
            AgentOutput::Text(text) => text.clone(),
            AgentOutput::ToolInvocation { id, name } => format!(
                "function:{}",
                serde_json::json!({ "id": id, "name": name })
            ),
        }
    }
}

/// A streaming exchange in flight.
///
/// Dropping the exchange cancels the provider call.
pub struct AgentExchange {
    output: mpsc::Receiver<AgentOutput>,
    outcome: oneshot::Receiver<Result<AgentReply, LlmError>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl AgentExchange {
    /// Next output item, or `None` once the stream has ended.
    pub async fn next_output(&mut self) -> Option<AgentOutput> {
        self.output.recv().await
    }

    /// Wait for the terminal result: the full reply (narration followed by
    /// raw tool-argument fragments) or the error that ended the exchange.
    pub async fn outcome(self) -> Result<String, LlmError> {
        self.reply().await.map(|reply| reply.full)
    }

    /// Like [`outcome`](Self::outcome), keeping narration and each function
    /// call's arguments apart.
    pub async fn reply(self) -> Result<AgentReply, LlmError> {
        let AgentExchange {
            output,
            outcome,
            _guard,
            ..
        } = self;
        drop(output);
        match outcome.await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Stream(
                "exchange ended without a result".to_string(),
            )),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Terminal result of a successful exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub full: String,
    pub narration: String,
    /// Function calls in stream order with their accumulated arguments.
    pub tool_calls: Vec<ToolInvocation>,
}

impl AgentReply {
    pub fn first_tool_call(&self) -> Option<&ToolInvocation> {
        self.tool_calls.first()
    }
}

/// A chat agent with its own history and tools.
pub struct SubAgent {
    name: String,
    provider: Arc<BoxLlmProvider>,
    model: String,
    history: Arc<Mutex<Vec<Message>>>,
    tools: Vec<ToolSpec>,
    busy: Arc<tokio::sync::Mutex<()>>,
}

impl SubAgent {
    pub fn new(name: impl Into<String>, provider: Arc<BoxLlmProvider>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider,
            model: model.into(),
            history: Arc::new(Mutex::new(Vec::new())),
            tools: Vec::new(),
            busy: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Put `prompt` in slot 0, replacing an existing system message.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let prompt = prompt.into();
        match history.first_mut() {
            Some(first) if first.role == MessageRole::System => first.content = prompt,
            _ => history.insert(0, Message::system(prompt)),
        }
    }

    pub fn set_tools(&mut self, tools: Vec<ToolSpec>) {
        self.tools = tools;
    }

    /// Replace everything after the system prompt with `messages`.
    pub fn restore(&mut self, messages: impl IntoIterator<Item = Message>) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let keep = usize::from(matches!(history.first(), Some(m) if m.role == MessageRole::System));
        history.truncate(keep);
        history.extend(
            messages
                .into_iter()
                .filter(|m| m.role != MessageRole::System),
        );
    }

    /// Snapshot of the current history.
    pub fn history(&self) -> Vec<Message> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One non-streaming round trip without tools.
    pub async fn handle(&mut self, text: &str) -> Result<String, LlmError> {
        let _busy = self
            .busy
            .clone()
            .try_lock_owned()
            .map_err(|_| LlmError::InvalidRequest("agent exchange already in flight".to_string()))?;

        let messages = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(Message::user(text));
            history.clone()
        };
        let request = CompletionRequest::new(self.model.clone(), messages);

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %self.model,
            gen_ai.agent.name = %self.name,
            gen_ai.request.stream = false,
        );
        let response = self.provider.complete(&request).instrument(span).await?;

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Message::assistant(response.content.clone()));
        Ok(response.content)
    }

    /// Start a streaming exchange for `turn`.
    ///
    /// Fails immediately if a previous exchange has not resolved yet.
    /// Cancelling `cancel` aborts the provider stream with
    /// [`LlmError::Cancelled`].
    pub fn handle_async(
        &mut self,
        turn: AgentTurn,
        cancel: CancellationToken,
    ) -> Result<AgentExchange, LlmError> {
        let busy = self
            .busy
            .clone()
            .try_lock_owned()
            .map_err(|_| LlmError::InvalidRequest("agent exchange already in flight".to_string()))?;

        let messages = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            match turn {
                AgentTurn::Message { role, text } => {
                    if !text.is_empty() {
                        history.push(Message::new(role, text));
                    }
                }
                AgentTurn::ToolResult { ack, invocation } => {
                    let call_id = invocation.id.clone();
                    history.push(Message::tool_request(ack.clone(), invocation));
                    history.push(Message::tool_result(ack, call_id));
                }
            }
            history.clone()
        };

        let mut request = CompletionRequest::new(self.model.clone(), messages);
        request.stream = true;
        request.tools = self.tools.clone();

        let span = info_span!(
            "gen_ai.execute",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %self.model,
            gen_ai.agent.name = %self.name,
            gen_ai.request.stream = true,
        );
        let stream = self.provider.stream(request);

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let history = Arc::clone(&self.history);
        let task_cancel = cancel.clone();

        tokio::spawn(
            async move {
                let result = drive(stream, output_tx, task_cancel).await.inspect(|reply| {
                    if !reply.narration.trim().is_empty() {
                        history
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(Message::assistant(reply.narration.clone()));
                    }
                });
                if let Err(ref e) = result {
                    debug!(error = %e, "exchange ended with error");
                }
                drop(busy);
                let _ = outcome_tx.send(result);
            }
            .instrument(span),
        );

        Ok(AgentExchange {
            output: output_rx,
            outcome: outcome_rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        })
    }
}

/// Pump provider events into the output channel until the stream ends.
///
/// `output` is dropped on return, which closes the channel before the
/// caller publishes the terminal result.
async fn drive(
    mut stream: LlmEventStream,
    output: mpsc::Sender<AgentOutput>,
    cancel: CancellationToken,
) -> Result<AgentReply, LlmError> {
    let mut reply = AgentReply::default();
    let mut call_indices: Vec<u32> = Vec::new();
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            event = stream.next() => event,
        };
        let Some(event) = event else { break };
        match event? {
            StreamEvent::TextDelta { text, .. } => {
                reply.full.push_str(&text);
                reply.narration.push_str(&text);
                let _ = output.send(AgentOutput::Text(text)).await;
            }
            StreamEvent::ToolCallStart { index, id, name } => {
                call_indices.push(index);
                reply.tool_calls.push(ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: String::new(),
                });
                let _ = output.send(AgentOutput::ToolInvocation { id, name }).await;
            }
            StreamEvent::ToolCallDelta { index, arguments } => {
                reply.full.push_str(&arguments);
                let slot = call_indices
                    .iter()
                    .rposition(|i| *i == index)
                    .or_else(|| reply.tool_calls.len().checked_sub(1));
                if let Some(call) = slot.and_then(|at| reply.tool_calls.get_mut(at)) {
                    call.arguments.push_str(&arguments);
                }
            }
            StreamEvent::Done => break,
            StreamEvent::Connected | StreamEvent::MessageDelta { .. } | StreamEvent::Usage(_) => {}
        }
    }
    Ok(reply)
}
