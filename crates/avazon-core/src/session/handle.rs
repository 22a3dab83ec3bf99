//! Handle to a live creation session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use avazon_types::chat::CreationChat;
use avazon_types::creation::{AvatarCreation, AvatarCreationDetail, ObjectType, SubObject};
use avazon_types::error::CreationError;
use avazon_types::status::CreationStatus;
use avazon_types::tool::{ToolCall, tool_spec};

use crate::agent::SubAgent;
use crate::generation::Generators;
use crate::llm::box_provider::BoxLlmProvider;
use crate::prompt::BoxPromptRegistry;
use crate::repository::creation::CreationRepository;

use super::actor::{ActorCommand, ObjectActor};
use super::events::SessionEvent;
use super::state::SessionCore;

/// Everything needed to bring a session online.
pub struct SessionDeps<R: CreationRepository> {
    pub repo: Arc<R>,
    pub prompts: Arc<BoxPromptRegistry>,
    pub generators: Generators,
    pub llm: Arc<BoxLlmProvider>,
    pub model: String,
    pub queue_capacity: usize,
}

impl<R: CreationRepository> Clone for SessionDeps<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            prompts: Arc::clone(&self.prompts),
            generators: self.generators.clone(),
            llm: Arc::clone(&self.llm),
            model: self.model.clone(),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// A live session: shared state plus one actor per object type.
pub struct CreationSession<R: CreationRepository> {
    core: Arc<SessionCore<R>>,
    actors: HashMap<ObjectType, mpsc::Sender<ActorCommand>>,
}

impl<R: CreationRepository> std::fmt::Debug for CreationSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationSession").finish_non_exhaustive()
    }
}

impl<R: CreationRepository + 'static> CreationSession<R> {
    /// Load session `id`, seed the three sub-agents with their prompts and
    /// restored chat history, and start their actors.
    pub async fn open(id: Uuid, deps: SessionDeps<R>) -> Result<Arc<Self>, CreationError> {
        let core = Arc::new(
            SessionCore::load(
                id,
                Arc::clone(&deps.repo),
                Arc::clone(&deps.prompts),
                deps.generators.clone(),
                deps.queue_capacity,
            )
            .await?,
        );
        let chats = deps.repo.list_chats(&id, None).await?;

        let mut actors = HashMap::new();
        for object_type in ObjectType::ALL {
            let agent_name = chat_agent(object_type);
            let mut agent = SubAgent::new(agent_name.as_str(), Arc::clone(&deps.llm), deps.model.clone());
            agent.set_system_prompt(deps.prompts.system_prompt_or_default(agent_name).await);
            agent.set_tools(vec![tool_spec(object_type)]);
            agent.restore(
                chats
                    .iter()
                    .filter(|c| c.object_type == object_type)
                    .map(CreationChat::to_message),
            );
            let tx = ObjectActor::spawn(object_type, Arc::clone(&core), agent, deps.queue_capacity);
            actors.insert(object_type, tx);
        }

        info!(session_id = %id, restored_turns = chats.len(), "creation session opened");
        Ok(Arc::new(Self { core, actors }))
    }

    pub fn id(&self) -> Uuid {
        self.core.id()
    }

    pub fn user_id(&self) -> &str {
        self.core.user_id()
    }

    pub fn snapshot(&self) -> AvatarCreation {
        self.core.snapshot()
    }

    pub async fn detail(&self) -> AvatarCreationDetail {
        self.core.detail().await
    }

    /// Receive this session's events, replacing any earlier receiver.
    pub fn attach(&self) -> mpsc::Receiver<SessionEvent> {
        self.core.touch();
        self.core.attach()
    }

    pub fn touch(&self) {
        self.core.touch();
    }

    pub fn idle_for(&self) -> Duration {
        self.core.idle_for()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub async fn can_create_now(&self, object_type: ObjectType) -> bool {
        self.core.can_create_now(object_type).await
    }

    fn actor(&self, object_type: ObjectType) -> Result<&mpsc::Sender<ActorCommand>, CreationError> {
        self.actors.get(&object_type).ok_or(CreationError::SessionClosed)
    }

    /// Queue a user message for the conversation of `object_type`.
    pub async fn route_user_message(
        &self,
        object_type: ObjectType,
        text: impl Into<String>,
    ) -> Result<(), CreationError> {
        self.core.ensure_open()?;
        self.core.touch();
        self.actor(object_type)?
            .send(ActorCommand::Chat { text: text.into() })
            .await
            .map_err(|_| CreationError::SessionClosed)
    }

    /// Start a job outside the conversation. Progress is delivered as
    /// creation events, in order with that object type's chat.
    pub async fn create(&self, call: ToolCall) -> Result<SubObject, CreationError> {
        self.core.touch();
        let actor = self.actor(call.object_type())?;
        let (row, progress) = self.core.start_job(call).await?;
        if actor.send(ActorCommand::Forward { progress }).await.is_err() {
            debug!(session_id = %self.id(), "actor gone, job progress will not be delivered");
        }
        Ok(row)
    }

    /// Mark the session completed.
    pub async fn confirm(&self) -> Result<AvatarCreation, CreationError> {
        self.core.ensure_open()?;
        let creation = self.core.set_status(CreationStatus::Completed, None).await?;
        self.core.emit(SessionEvent::closed()).await;
        self.core.shutdown();
        Ok(creation)
    }

    /// Tell the client, then stop the actors and cancel open streams.
    pub async fn close(&self) {
        if self.core.is_closed() {
            return;
        }
        self.core.emit(SessionEvent::closed()).await;
        self.shutdown();
    }

    /// Stop without notifying the client.
    pub fn shutdown(&self) {
        self.core.shutdown();
        info!(session_id = %self.id(), "creation session closed");
    }
}

/// The chat agent seeded into the sub-agent of each object type.
pub fn chat_agent(object_type: ObjectType) -> avazon_types::prompt::Agent {
    use avazon_types::prompt::Agent;
    match object_type {
        ObjectType::Image => Agent::ImageChat,
        ObjectType::Character => Agent::CharacterChat,
        ObjectType::Voice => Agent::VoiceChat,
    }
}
