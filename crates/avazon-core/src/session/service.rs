//! Avatar creation service.
//!
//! Entry point for everything about creation sessions: starting one,
//! entering it (which brings the live session online), explicit job
//! creation, confirmation and publishing the finished avatar.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use avazon_types::avatar::Avatar;
use avazon_types::creation::{
    AvatarCreation, AvatarCreationDetail, ObjectType, StartCreationRequest, SubObject,
};
use avazon_types::error::{CreationError, RepositoryError};
use avazon_types::status::CreationStatus;
use avazon_types::tool::ToolCall;

use crate::repository::creation::{CreationRepository, PublishedAttempts};

use super::handle::{CreationSession, SessionDeps};
use super::registry::SessionRegistry;

/// Reason recorded on a session replaced by a newer one.
pub const SUPERSEDED_REASON: &str = "superseded by a new creation session";

pub struct AvatarCreationService<R: CreationRepository> {
    deps: SessionDeps<R>,
    registry: Arc<SessionRegistry<R>>,
}

impl<R: CreationRepository> Clone for AvatarCreationService<R> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R: CreationRepository + 'static> AvatarCreationService<R> {
    pub fn new(deps: SessionDeps<R>, registry: Arc<SessionRegistry<R>>) -> Self {
        Self { deps, registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<R>> {
        &self.registry
    }

    /// Load a session owned by `user_id`. Someone else's session is
    /// reported as missing.
    async fn owned(&self, user_id: &str, id: &Uuid) -> Result<AvatarCreation, CreationError> {
        match self.deps.repo.get_creation(id).await? {
            Some(creation) if creation.user_id == user_id => Ok(creation),
            _ => Err(CreationError::NotFound),
        }
    }

    /// Start a new session, failing any session the user still has open.
    pub async fn start_creation(
        &self,
        user_id: &str,
        request: StartCreationRequest,
    ) -> Result<AvatarCreation, CreationError> {
        request.validate()?;

        for mut stale in self.deps.repo.list_active_creations(user_id).await? {
            if let Some(session) = self.registry.get(&stale.id) {
                session.close().await;
            }
            self.registry.evict(&stale.id);
            stale.status = CreationStatus::Failed;
            stale.failed_reason = Some(SUPERSEDED_REASON.to_string());
            stale.updated_at = Utc::now();
            self.deps.repo.update_creation(&stale).await?;
            info!(session_id = %stale.id, "superseded stale creation session");
        }

        let creation = AvatarCreation::new(user_id, request);
        self.deps.repo.create_creation(&creation).await?;
        info!(session_id = %creation.id, user_id = %user_id, "started creation session");
        Ok(creation)
    }

    /// The session with all of its attempts.
    pub async fn get_creation(&self, user_id: &str, id: &Uuid) -> Result<AvatarCreationDetail, CreationError> {
        let creation = self.owned(user_id, id).await?;
        if let Some(session) = self.registry.get(id) {
            return Ok(session.detail().await);
        }
        Ok(AvatarCreationDetail {
            images: self.deps.repo.list_images(id).await?,
            characters: self.deps.repo.list_characters(id).await?,
            voices: self.deps.repo.list_voices(id).await?,
            creation,
        })
    }

    /// Bring the session online for its owner.
    ///
    /// A `ready` session moves to `processing` on first entry.
    pub async fn enter_session(
        &self,
        user_id: &str,
        id: &Uuid,
    ) -> Result<Arc<CreationSession<R>>, CreationError> {
        let mut creation = self.owned(user_id, id).await?;
        if !creation.is_active() {
            return Err(CreationError::SessionNotActive(creation.status.to_string()));
        }
        if creation.status == CreationStatus::Ready {
            creation.status = CreationStatus::Processing;
            creation.updated_at = Utc::now();
            creation.last_active_at = creation.updated_at;
            self.deps.repo.update_creation(&creation).await?;
        }

        let session = self
            .registry
            .get_or_open(*id, CreationSession::open(*id, self.deps.clone()))
            .await?;
        session.touch();
        Ok(session)
    }

    /// Start a generation job without going through the conversation.
    pub async fn create(&self, user_id: &str, id: &Uuid, call: ToolCall) -> Result<SubObject, CreationError> {
        let session = self.enter_session(user_id, id).await?;
        session.create(call).await
    }

    pub async fn can_create_now(
        &self,
        user_id: &str,
        id: &Uuid,
        object_type: ObjectType,
    ) -> Result<bool, CreationError> {
        let session = self.enter_session(user_id, id).await?;
        Ok(session.can_create_now(object_type).await)
    }

    /// Mark the session completed and drop it from the registry.
    pub async fn confirm(&self, session: &CreationSession<R>) -> Result<AvatarCreation, CreationError> {
        let creation = session.confirm().await?;
        self.registry.evict(&session.id());
        Ok(creation)
    }

    pub async fn close(&self, session: &CreationSession<R>) {
        session.close().await;
        self.registry.evict(&session.id());
    }

    /// The latest attempt of each object, provided all three completed.
    async fn latest_completed(&self, id: &Uuid) -> Result<Finished, CreationError> {
        let image = self
            .deps
            .repo
            .list_images(id)
            .await?
            .pop()
            .filter(|c| c.status == CreationStatus::Completed && c.image_url.is_some())
            .ok_or(CreationError::ImageNotCompleted)?;
        let character = self
            .deps
            .repo
            .list_characters(id)
            .await?
            .pop()
            .filter(|c| c.status == CreationStatus::Completed && c.generated_character.is_some())
            .ok_or(CreationError::CharacterNotCompleted)?;
        let voice = self
            .deps
            .repo
            .list_voices(id)
            .await?
            .pop()
            .filter(|c| c.status == CreationStatus::Completed && c.voice_url.is_some())
            .ok_or(CreationError::VoiceNotCompleted)?;

        Ok(Finished {
            attempts: PublishedAttempts {
                image: image.id,
                character: character.id,
                voice: voice.id,
            },
            image_url: image.image_url.unwrap_or_default(),
            character: character.generated_character.unwrap_or_default(),
            voice_id: voice.voice_id,
            voice_url: voice.voice_url.unwrap_or_default(),
        })
    }

    /// Publish the session's latest attempts as avatar `avatar_id`.
    ///
    /// A confirmed session can still publish once; the store rejects a
    /// second avatar for the same session.
    pub async fn publish_avatar(
        &self,
        user_id: &str,
        id: &Uuid,
        avatar_id: &str,
    ) -> Result<Avatar, CreationError> {
        let avatar_id = avatar_id.trim();
        if avatar_id.is_empty() {
            return Err(avazon_types::error::ValidationError::new("avatar_id", "must not be empty").into());
        }
        let creation = self.owned(user_id, id).await?;
        if !creation.can_publish() {
            return Err(CreationError::SessionNotActive(creation.status.to_string()));
        }

        let finished = self.latest_completed(id).await?;
        let avatar = Avatar {
            id: avatar_id.to_string(),
            user_id: user_id.to_string(),
            avatar_creation_id: Some(creation.id),
            remix_avatar_id: None,
            name: creation.name,
            species: creation.species,
            gender: creation.gender,
            language: creation.language,
            country: creation.country,
            description: creation.description,
            profile_image_url: finished.image_url,
            voice_id: finished.voice_id,
            voice_url: finished.voice_url,
            character_description: finished.character,
            created_at: Utc::now(),
        };
        match self.deps.repo.publish_avatar(id, &finished.attempts, &avatar).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(message)) => {
                // A newer attempt may have started since the read above.
                self.latest_completed(id).await?;
                return Err(CreationError::Conflict(message));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(session) = self.registry.get(id) {
            session.close().await;
        }
        self.registry.evict(id);
        info!(session_id = %id, avatar_id = %avatar.id, "published avatar");
        Ok(avatar)
    }
}

struct Finished {
    attempts: PublishedAttempts,
    image_url: String,
    character: String,
    voice_id: Option<String>,
    voice_url: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::prompt::{BoxPromptRegistry, PromptService};
    use crate::session::events::{EventScope, SessionEvent, SessionEventKind};
    use crate::testing::{FakePainter, Fakes, MemoryStore, ScriptedLlm, Switch, start_request};
    use avazon_types::chat::MessageRole;
    use avazon_types::creation::{CharacterCreation, ImageCreation, VoiceCreation};
    use avazon_types::tool::{ImageParams, VoiceAccent, VoiceAge, VoiceGender, VoiceParams};

    struct Harness {
        store: MemoryStore,
        service: AvatarCreationService<MemoryStore>,
    }

    fn harness(llm: ScriptedLlm, fakes: &Fakes, idle: Duration) -> Harness {
        let store = MemoryStore::new();
        let provider = Arc::new(BoxLlmProvider::new(llm));
        let prompts = PromptService::new(Arc::new(store.clone()), Arc::clone(&provider), "test-model");
        let deps = SessionDeps {
            repo: Arc::new(store.clone()),
            prompts: Arc::new(BoxPromptRegistry::new(prompts)),
            generators: fakes.generators(),
            llm: provider,
            model: "test-model".to_string(),
            queue_capacity: 64,
        };
        Harness {
            store,
            service: AvatarCreationService::new(deps, Arc::new(SessionRegistry::new(idle))),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("event channel closed")
    }

    fn voice_params() -> VoiceParams {
        VoiceParams {
            summary: "bright".to_string(),
            gender: VoiceGender::Female,
            accent_strength: 1.0,
            age: VoiceAge::Young,
            accent: VoiceAccent::American,
        }
    }

    #[tokio::test]
    async fn new_session_supersedes_active_one() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let first = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &first.id).await.unwrap();
        let mut events = session.attach();

        let second = h.service.start_creation("u1", start_request()).await.unwrap();
        assert_ne!(first.id, second.id);

        let old = h.store.get_creation(&first.id).await.unwrap().unwrap();
        assert_eq!(old.status, CreationStatus::Failed);
        assert_eq!(old.failed_reason.as_deref(), Some(SUPERSEDED_REASON));
        assert_eq!(next_event(&mut events).await, SessionEvent::closed());
        assert!(h.service.registry().get(&first.id).is_none());
        assert_eq!(h.store.list_active_creations("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn start_rejects_invalid_profile() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let mut request = start_request();
        request.name = " ".to_string();
        let err = h.service.start_creation("u1", request).await.unwrap_err();
        assert!(matches!(err, CreationError::Validation(_)));
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_owner() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();

        let err = h.service.enter_session("intruder", &creation.id).await.unwrap_err();
        assert!(matches!(err, CreationError::NotFound));
        assert!(matches!(
            h.service.get_creation("intruder", &creation.id).await.unwrap_err(),
            CreationError::NotFound
        ));

        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        assert_eq!(session.snapshot().status, CreationStatus::Processing);
        let again = h.service.enter_session("u1", &creation.id).await.unwrap();
        assert!(Arc::ptr_eq(&session, &again));
    }

    #[tokio::test]
    async fn chat_with_tool_call_runs_job_and_resumes_agent() {
        let llm = ScriptedLlm::new()
            .reply_tool_call(
                "Let me paint.",
                "call_1",
                "create_avatar_image",
                r#"{"summary":"fox in a red scarf"}"#,
            )
            .reply_text(&["Here ", "it is!"]);
        let fakes = Fakes::default();
        let h = harness(llm.clone(), &fakes, Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        let mut events = session.attach();

        session.route_user_message(ObjectType::Image, "paint me").await.unwrap();

        let mut seen = Vec::new();
        loop {
            let event = next_event(&mut events).await;
            let done = event.event == SessionEventKind::Chat && event.content == "Here it is!";
            seen.push(event);
            if done {
                break;
            }
        }
        let kinds: Vec<_> = seen.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                SessionEventKind::Chat,
                SessionEventKind::Chunk,
                SessionEventKind::Function,
                SessionEventKind::Chat,
                SessionEventKind::Creation,
                SessionEventKind::Creation,
                SessionEventKind::Creation,
                SessionEventKind::Creation,
                SessionEventKind::Creation,
                SessionEventKind::Chunk,
                SessionEventKind::Chunk,
                SessionEventKind::Chat,
            ]
        );
        assert_eq!(seen[0].content, "paint me");
        assert_eq!(
            seen[2].content,
            r#"function:{"id":"call_1","name":"create_avatar_image"}"#
        );
        assert!(seen.iter().all(|e| e.object_type == EventScope::Image));

        let images = h.store.list_images(&creation.id).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].summary, "fox in a red scarf");
        assert_eq!(images[0].status, CreationStatus::Completed);

        let chats = h.store.list_chats(&creation.id, Some(ObjectType::Image)).await.unwrap();
        let roles: Vec<_> = chats.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
            ]
        );
        assert_eq!(chats[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(chats[3].content, "creation completed");
        assert!(chats.iter().all(|c| c.created_object_number == 0));

        let follow_up = &llm.requests()[1];
        let tail: Vec<_> = follow_up.messages.iter().rev().take(2).map(|m| m.role).collect();
        assert_eq!(tail, vec![MessageRole::Tool, MessageRole::Assistant]);
        assert_eq!(follow_up.tools.len(), 1);
    }

    #[tokio::test]
    async fn tool_arguments_come_from_the_call_not_the_narration() {
        let llm = ScriptedLlm::new()
            .reply_tool_call(
                r#"Something like {"summary":"a plain cat"}? No, better:"#,
                "call_1",
                "create_avatar_image",
                r#"{"summary":"fox in a red scarf"}"#,
            )
            .reply_text(&["Done."]);
        let h = harness(llm, &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        let mut events = session.attach();

        session.route_user_message(ObjectType::Image, "paint me").await.unwrap();
        loop {
            let event = next_event(&mut events).await;
            if event.event == SessionEventKind::Chat && event.content == "Done." {
                break;
            }
        }

        let images = h.store.list_images(&creation.id).await.unwrap();
        assert_eq!(images[0].summary, "fox in a red scarf");
        let chats = h.store.list_chats(&creation.id, Some(ObjectType::Image)).await.unwrap();
        assert_eq!(chats[1].content, r#"Something like {"summary":"a plain cat"}? No, better:"#);
    }

    #[tokio::test]
    async fn invalid_tool_arguments_are_acknowledged_not_run() {
        let llm = ScriptedLlm::new()
            .reply_tool_call("", "call_1", "create_avatar_voice", r#"{"summary":"x"}"#)
            .reply_text(&["Could you tell me more?"]);
        let h = harness(llm, &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        let mut events = session.attach();

        session.route_user_message(ObjectType::Voice, "sing").await.unwrap();
        loop {
            let event = next_event(&mut events).await;
            assert_ne!(event.event, SessionEventKind::Creation);
            if event.content == "Could you tell me more?" && event.event == SessionEventKind::Chat {
                break;
            }
        }
        assert!(h.store.list_voices(&creation.id).await.unwrap().is_empty());
        let tool_turn = h
            .store
            .chats()
            .into_iter()
            .find(|c| c.role == MessageRole::Tool)
            .unwrap();
        assert!(tool_turn.content.starts_with("invalid arguments"));
    }

    #[tokio::test]
    async fn explicit_create_is_blocked_while_in_flight() {
        let (switch, gate) = Switch::gated();
        let fakes = Fakes {
            painter: FakePainter {
                switch,
                ..Default::default()
            },
            ..Default::default()
        };
        let h = harness(ScriptedLlm::new(), &fakes, Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let call = ToolCall::CreateImage(ImageParams { summary: "fox".into() });

        let row = h.service.create("u1", &creation.id, call.clone()).await.unwrap();
        assert_eq!(row.attempt(), 0);
        assert!(!h.service.can_create_now("u1", &creation.id, ObjectType::Image).await.unwrap());

        let err = h.service.create("u1", &creation.id, call).await.unwrap_err();
        assert!(matches!(err, CreationError::Blocked(ObjectType::Image)));
        assert_eq!(h.store.image_count(), 1);

        // other object types are not held up
        assert!(
            h.service
                .create("u1", &creation.id, ToolCall::CreateVoice(voice_params()))
                .await
                .is_ok()
        );
        gate.add_permits(1);
    }

    #[tokio::test]
    async fn restored_history_is_sent_with_next_message() {
        let llm = ScriptedLlm::new();
        let h = harness(llm.clone(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        h.store
            .save_chat(&avazon_types::chat::CreationChat::new(
                creation.id,
                ObjectType::Character,
                MessageRole::User,
                "make her brave",
                0,
            ))
            .await
            .unwrap();

        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        let mut events = session.attach();
        session.route_user_message(ObjectType::Character, "and kind").await.unwrap();
        while next_event(&mut events).await.event != SessionEventKind::Chunk {}

        let request = &llm.requests()[0];
        let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[1..], ["make her brave", "and kind"]);
        assert_eq!(request.tools[0].name, "create_avatar_character");
    }

    #[tokio::test]
    async fn close_stops_the_session() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        let mut events = session.attach();

        h.service.close(&session).await;
        assert_eq!(next_event(&mut events).await, SessionEvent::closed());
        assert!(matches!(
            session.route_user_message(ObjectType::Image, "hi").await.unwrap_err(),
            CreationError::SessionClosed
        ));
        assert!(h.service.registry().is_empty());

        // the stored session is still active and can be entered again
        let reopened = h.service.enter_session("u1", &creation.id).await.unwrap();
        assert!(!Arc::ptr_eq(&session, &reopened));
    }

    #[tokio::test]
    async fn confirm_completes_session() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();

        let confirmed = h.service.confirm(&session).await.unwrap();
        assert_eq!(confirmed.status, CreationStatus::Completed);
        assert!(matches!(
            h.service.enter_session("u1", &creation.id).await.unwrap_err(),
            CreationError::SessionNotActive(status) if status == "completed"
        ));
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::from_millis(5));
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.service.registry().evict_idle(), 1);
        assert!(session.is_closed());
        assert!(h.service.registry().is_empty());
    }

    #[tokio::test]
    async fn zero_timeout_disables_idle_eviction() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        h.service.enter_session("u1", &creation.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.service.registry().evict_idle(), 0);
        assert_eq!(h.service.registry().len(), 1);
    }

    async fn seed_completed(store: &MemoryStore, id: Uuid, image: bool, character: bool, voice: bool) {
        if image {
            let mut row = ImageCreation::new(id, 0, "fox");
            row.status = CreationStatus::Completed;
            row.image_url = Some("mem://blobs/image.png".to_string());
            store.insert_image(&row).await.unwrap();
        }
        if character {
            let mut row = CharacterCreation::new(id, 0);
            row.status = CreationStatus::Completed;
            row.generated_character = Some("Brave.".to_string());
            store.insert_character(&row).await.unwrap();
        }
        if voice {
            let mut row = VoiceCreation::new(id, 0, voice_params());
            row.status = CreationStatus::Completed;
            row.voice_id = Some("v-1".to_string());
            row.voice_url = Some("mem://blobs/voice.mp3".to_string());
            store.insert_voice(&row).await.unwrap();
        }
    }

    #[tokio::test]
    async fn publish_reports_each_missing_prerequisite() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();

        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::ImageNotCompleted));

        seed_completed(&h.store, creation.id, true, false, false).await;
        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::CharacterNotCompleted));

        seed_completed(&h.store, creation.id, false, true, false).await;
        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::VoiceNotCompleted));

        // a newer, failed image attempt hides the completed one
        let mut failed = ImageCreation::new(creation.id, 1, "again");
        failed.status = CreationStatus::Failed;
        failed.failed_reason = Some("painter down".to_string());
        h.store.insert_image(&failed).await.unwrap();
        seed_completed(&h.store, creation.id, false, false, true).await;
        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::ImageNotCompleted));
    }

    #[tokio::test]
    async fn publish_creates_avatar_and_completes_session() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        seed_completed(&h.store, creation.id, true, true, true).await;

        let avatar = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap();
        assert_eq!(avatar.id, "a1");
        assert_eq!(avatar.avatar_creation_id, Some(creation.id));
        assert_eq!(avatar.character_description, "Brave.");
        assert_eq!(avatar.voice_id.as_deref(), Some("v-1"));

        let stored = h.store.get_creation(&creation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CreationStatus::Completed);
        assert!(matches!(
            h.service.publish_avatar("u1", &creation.id, "a2").await.unwrap_err(),
            CreationError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn confirmed_session_publishes_once() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        seed_completed(&h.store, creation.id, true, true, true).await;
        let session = h.service.enter_session("u1", &creation.id).await.unwrap();
        h.service.confirm(&session).await.unwrap();

        let avatar = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap();
        assert_eq!(avatar.avatar_creation_id, Some(creation.id));
        assert_eq!(h.store.avatars().len(), 1);

        let err = h.service.publish_avatar("u1", &creation.id, "a2").await.unwrap_err();
        assert!(matches!(err, CreationError::Conflict(_)));
        assert_eq!(h.store.avatars().len(), 1);
    }

    #[tokio::test]
    async fn failed_session_cannot_publish() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        seed_completed(&h.store, creation.id, true, true, true).await;
        h.service.start_creation("u1", start_request()).await.unwrap();

        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::SessionNotActive(status) if status == "failed"));
    }

    #[tokio::test]
    async fn store_rejects_attempts_that_are_no_longer_latest() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        seed_completed(&h.store, creation.id, true, true, true).await;
        let images = h.store.list_images(&creation.id).await.unwrap();
        let characters = h.store.list_characters(&creation.id).await.unwrap();
        let voices = h.store.list_voices(&creation.id).await.unwrap();
        let read_before = PublishedAttempts {
            image: images[0].id,
            character: characters[0].id,
            voice: voices[0].id,
        };

        // a new image attempt starts between the read and the publish
        h.store
            .insert_image(&ImageCreation::new(creation.id, 1, "again"))
            .await
            .unwrap();
        let avatar = crate::testing::sample_avatar("a1", "u1");
        let err = h
            .store
            .publish_avatar(&creation.id, &read_before, &avatar)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(h.store.avatars().is_empty());
        let stored = h.store.get_creation(&creation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CreationStatus::Ready);

        // the service reports the in-flight attempt
        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::ImageNotCompleted));
    }

    #[tokio::test]
    async fn publish_under_taken_id_conflicts() {
        let h = harness(ScriptedLlm::new(), &Fakes::default(), Duration::ZERO);
        h.store.insert_avatar(crate::testing::sample_avatar("a1", "someone"));
        let creation = h.service.start_creation("u1", start_request()).await.unwrap();
        seed_completed(&h.store, creation.id, true, true, true).await;

        let err = h.service.publish_avatar("u1", &creation.id, "a1").await.unwrap_err();
        assert!(matches!(err, CreationError::Conflict(_)));
    }
}
