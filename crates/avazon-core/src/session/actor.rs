//! One actor task per object type.
//!
//! The actor owns its `SubAgent` and takes one command at a time from its
//! inbox: a chat message runs "persist → stream reply → maybe run the tool
//! → resume the agent" to completion before the next command is read, so
//! the events of one object type reach the client in production order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{Instrument, debug, info_span, warn};

use avazon_types::chat::{CreationChat, MessageRole};
use avazon_types::creation::{CreationProgress, CreationStep, ObjectType};
use avazon_types::error::CreationError;
use avazon_types::llm::{LlmError, ToolInvocation};
use avazon_types::tool::ToolCall;

use crate::agent::{AgentExchange, AgentOutput, AgentReply, AgentTurn, SubAgent};
use crate::repository::creation::CreationRepository;

use super::events::SessionEvent;
use super::state::SessionCore;

pub(crate) const ACK_COMPLETED: &str = "creation completed";

pub(crate) enum ActorCommand {
    Chat { text: String },
    /// Relay the progress of a job started outside the conversation.
    Forward {
        progress: mpsc::Receiver<CreationProgress>,
    },
}

pub(crate) struct ObjectActor<R: CreationRepository> {
    object_type: ObjectType,
    core: Arc<SessionCore<R>>,
    agent: SubAgent,
    inbox: mpsc::Receiver<ActorCommand>,
}

impl<R: CreationRepository + 'static> ObjectActor<R> {
    pub(crate) fn spawn(
        object_type: ObjectType,
        core: Arc<SessionCore<R>>,
        agent: SubAgent,
        capacity: usize,
    ) -> mpsc::Sender<ActorCommand> {
        let (tx, inbox) = mpsc::channel(capacity.max(1));
        let span = info_span!(
            "object_actor",
            session_id = %core.id(),
            object_type = %object_type,
        );
        let actor = Self {
            object_type,
            core,
            agent,
            inbox,
        };
        tokio::spawn(actor.run().instrument(span));
        tx
    }

    async fn run(mut self) {
        let closed = self.core.closed().clone();
        loop {
            let command = tokio::select! {
                biased;
                _ = closed.cancelled() => break,
                command = self.inbox.recv() => command,
            };
            let Some(command) = command else { break };

            match command {
                ActorCommand::Chat { text } => {
                    if let Err(e) = self.chat(text).await {
                        if self.core.is_closed() {
                            break;
                        }
                        warn!(error = %e, "chat turn failed");
                        self.core
                            .emit(SessionEvent::error(self.object_type, e.to_string()))
                            .await;
                    }
                }
                ActorCommand::Forward { progress } => {
                    self.forward_progress(progress).await;
                }
            }
        }
        debug!("object actor stopped");
    }

    /// Handle one user message end to end.
    async fn chat(&mut self, text: String) -> Result<(), CreationError> {
        let object_type = self.object_type;
        let attempt = self.core.attempt_count(object_type).await;
        let chat = CreationChat::new(self.core.id(), object_type, MessageRole::User, text.clone(), attempt);
        self.core.save_chat(&chat).await?;
        self.core.emit(SessionEvent::chat(object_type, text.clone())).await;

        let exchange = self
            .agent
            .handle_async(AgentTurn::user(text), self.core.closed().child_token())?;
        let reply = self.stream(exchange).await?;

        let Some(invocation) = reply.first_tool_call().cloned() else {
            return self.save_narration(&reply.narration, attempt).await;
        };
        self.save_narration(&reply.narration, attempt).await?;
        let arguments = if invocation.arguments.trim().is_empty() {
            "{}".to_string()
        } else {
            invocation.arguments
        };

        let ack = self.run_tool(&invocation.name, &arguments).await;
        let follow_up = self
            .response_after_tool_called(&ack, &invocation.name, &arguments, &invocation.id, attempt)
            .await?;
        let reply = self.stream(follow_up).await?;
        self.save_narration(&reply.narration, attempt).await
    }

    /// Forward an exchange's output as chunk/function events and return the
    /// terminal reply.
    async fn stream(&self, mut exchange: AgentExchange) -> Result<AgentReply, LlmError> {
        while let Some(item) = exchange.next_output().await {
            let event = match &item {
                AgentOutput::Text(chunk) => SessionEvent::chunk(self.object_type, chunk.clone()),
                AgentOutput::ToolInvocation { .. } => {
                    SessionEvent::function(self.object_type, item.encode())
                }
            };
            self.core.emit(event).await;
        }
        exchange.reply().await
    }

    async fn save_narration(&self, text: &str, attempt: u32) -> Result<(), CreationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let chat = CreationChat::new(self.core.id(), self.object_type, MessageRole::Assistant, text, attempt);
        self.core.save_chat(&chat).await?;
        self.core.emit(SessionEvent::chat(self.object_type, text)).await;
        Ok(())
    }

    /// Validate and run the requested function; the returned text is the
    /// acknowledgement handed back to the agent.
    async fn run_tool(&self, name: &str, arguments: &str) -> String {
        let call = match ToolCall::parse(name, arguments) {
            Ok(call) if call.object_type() == self.object_type => call,
            Ok(call) => {
                return format!(
                    "invalid arguments: {} is not available in the {} conversation",
                    call.function_name(),
                    self.object_type
                );
            }
            Err(e) => return format!("invalid arguments: {e}"),
        };

        match self.core.start_job(call).await {
            Ok((_, progress)) => self.forward_progress(progress).await,
            Err(CreationError::Blocked(_)) => {
                "creation blocked: the previous attempt is still in progress".to_string()
            }
            Err(e) => format!("creation failed: {e}"),
        }
    }

    /// Relay job progress as creation events until the job finishes or the
    /// session closes, and summarize the outcome.
    async fn forward_progress(&self, mut progress: mpsc::Receiver<CreationProgress>) -> String {
        let closed = self.core.closed().clone();
        let mut last: Option<CreationProgress> = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = closed.cancelled() => break,
                next = progress.recv() => next,
            };
            let Some(next) = next else { break };
            self.core.emit(SessionEvent::creation(&next)).await;
            let done = next.is_final();
            last = Some(next);
            if done {
                break;
            }
        }

        match last {
            Some(p) if p.step == CreationStep::Completed => ACK_COMPLETED.to_string(),
            Some(p) if p.step == CreationStep::Failed => format!(
                "creation failed: {}",
                p.creation.failed_reason().unwrap_or("unknown error")
            ),
            _ => "creation failed: interrupted".to_string(),
        }
    }

    /// Persist the tool request and result turns, then resume the agent in
    /// tool mode.
    async fn response_after_tool_called(
        &mut self,
        ack: &str,
        tool_name: &str,
        arguments: &str,
        tool_call_id: &str,
        attempt: u32,
    ) -> Result<AgentExchange, CreationError> {
        let invocation = ToolInvocation {
            id: tool_call_id.to_string(),
            name: tool_name.to_string(),
            arguments: arguments.to_string(),
        };
        let id = self.core.id();
        let request = CreationChat::new(id, self.object_type, MessageRole::Assistant, ack, attempt)
            .with_tool_call(&invocation);
        let result = CreationChat::new(id, self.object_type, MessageRole::Tool, ack, attempt)
            .with_tool_call(&invocation);
        self.core.save_chat(&request).await?;
        self.core.save_chat(&result).await?;

        let turn = AgentTurn::ToolResult {
            ack: ack.to_string(),
            invocation,
        };
        Ok(self
            .agent
            .handle_async(turn, self.core.closed().child_token())?)
    }
}
