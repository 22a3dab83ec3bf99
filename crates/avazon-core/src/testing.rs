//! In-memory fakes of every port, for unit tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use avazon_types::avatar::{Avatar, AvatarMusic, AvatarVideo, PageRequest};
use avazon_types::chat::CreationChat;
use avazon_types::content::{MusicCreation, VideoCreation};
use avazon_types::creation::{
    AvatarCreation, CharacterCreation, ImageCreation, ObjectType, StartCreationRequest,
    VoiceCreation,
};
use avazon_types::error::{ProviderError, RepositoryError};
use avazon_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, StopReason, StreamEvent, Usage,
};
use avazon_types::prompt::{Agent, SystemPrompt, SystemPromptUsage};
use avazon_types::remix::AvatarRemix;
use avazon_types::status::{ContentStatus, CreationStatus, RemixStatus};

use crate::generation::{
    BlobStore, BoxBlobStore, BoxImagePainter, BoxMusicProducer, BoxVideoProducer,
    BoxVoiceSynthesizer, DesignedVoice, GeneratedMedia, Generators, ImagePainter, MusicProducer,
    MusicPrompt, PaintRequest, VideoProducer, VoiceDesign, VoiceSynthesizer,
};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::{LlmEventStream, LlmProvider};
use crate::prompt::{BoxPromptRegistry, PromptService};
use crate::repository::avatar::AvatarRepository;
use crate::repository::content::ContentRepository;
use crate::repository::creation::{CreationRepository, PublishedAttempts};
use crate::repository::prompt::PromptRepository;
use crate::repository::remix::RemixRepository;

// ---------------------------------------------------------------------------
// Sample data
// ---------------------------------------------------------------------------

pub fn start_request() -> StartCreationRequest {
    StartCreationRequest {
        name: "Mira".to_string(),
        species: "fox".to_string(),
        gender: "female".to_string(),
        age: 7,
        language: "en".to_string(),
        country: "KR".to_string(),
        image_style: "watercolor".to_string(),
        description: Some("a curious traveller".to_string()),
    }
}

pub fn sample_avatar(id: &str, user_id: &str) -> Avatar {
    Avatar {
        id: id.to_string(),
        user_id: user_id.to_string(),
        avatar_creation_id: None,
        remix_avatar_id: None,
        name: "Mira".to_string(),
        species: "fox".to_string(),
        gender: "female".to_string(),
        language: "en".to_string(),
        country: "KR".to_string(),
        description: None,
        profile_image_url: format!("mem://blobs/{id}-profile.png"),
        voice_id: Some("voice-1".to_string()),
        voice_url: format!("mem://blobs/{id}-voice.mp3"),
        character_description: "Cheerful and curious.".to_string(),
        created_at: Utc::now(),
    }
}

/// Prompt registry over `store` whose completions come from `llm`.
pub fn prompt_registry(store: &MemoryStore, llm: ScriptedLlm) -> Arc<BoxPromptRegistry> {
    let provider = Arc::new(BoxLlmProvider::new(llm));
    let service = PromptService::new(Arc::new(store.clone()), provider, "test-model");
    Arc::new(BoxPromptRegistry::new(service))
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Scripted LLM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Text(Vec<String>),
    ToolCall {
        narration: String,
        id: String,
        name: String,
        arguments: String,
    },
    Error(String),
    Pending,
}

/// LLM fake that replays queued replies in order.
///
/// With the queue empty, `complete` echoes the last user message as
/// `echo: {text}` and `stream` replies `ok`.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn reply_text(self, chunks: &[&str]) -> Self {
        self.push(Script::Text(chunks.iter().map(|c| c.to_string()).collect()))
    }

    pub fn reply_tool_call(self, narration: &str, id: &str, name: &str, arguments: &str) -> Self {
        self.push(Script::ToolCall {
            narration: narration.to_string(),
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        })
    }

    pub fn reply_error(self, message: &str) -> Self {
        self.push(Script::Error(message.to_string()))
    }

    pub fn reply_pending(self) -> Self {
        self.push(Script::Pending)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &CompletionRequest) -> Option<Script> {
        self.requests.lock().unwrap().push(request.clone());
        self.scripts.lock().unwrap().pop_front()
    }
}

fn last_user_text(request: &CompletionRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn response(content: String) -> CompletionResponse {
    CompletionResponse {
        id: "resp-test".to_string(),
        content,
        model: "test-model".to_string(),
        stop_reason: StopReason::EndTurn,
        usage: Usage::default(),
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let script = self.next(request);
        let echo = format!("echo: {}", last_user_text(request));
        async move {
            match script {
                None => Ok(response(echo)),
                Some(Script::Text(parts)) => Ok(response(parts.concat())),
                Some(Script::ToolCall { narration, .. }) => Ok(response(narration)),
                Some(Script::Error(message)) => Err(LlmError::Provider { message }),
                Some(Script::Pending) => std::future::pending().await,
            }
        }
    }

    fn stream(&self, request: CompletionRequest) -> LlmEventStream {
        let events: Vec<Result<StreamEvent, LlmError>> = match self.next(&request) {
            None => vec![
                Ok(StreamEvent::TextDelta {
                    index: 0,
                    text: "ok".to_string(),
                }),
                Ok(StreamEvent::Done),
            ],
            Some(Script::Text(parts)) => parts
                .into_iter()
                .map(|text| Ok(StreamEvent::TextDelta { index: 0, text }))
                .chain(std::iter::once(Ok(StreamEvent::Done)))
                .collect(),
            Some(Script::ToolCall {
                narration,
                id,
                name,
                arguments,
            }) => {
                let mut events = vec![Ok(StreamEvent::Connected)];
                if !narration.is_empty() {
                    events.push(Ok(StreamEvent::TextDelta {
                        index: 0,
                        text: narration,
                    }));
                }
                events.push(Ok(StreamEvent::ToolCallStart { index: 0, id, name }));
                events.push(Ok(StreamEvent::ToolCallDelta {
                    index: 0,
                    arguments,
                }));
                events.push(Ok(StreamEvent::MessageDelta {
                    stop_reason: StopReason::ToolUse,
                }));
                events.push(Ok(StreamEvent::Done));
                events
            }
            Some(Script::Error(message)) => vec![Err(LlmError::Provider { message })],
            Some(Script::Pending) => return Box::pin(futures_util::stream::pending()),
        };
        Box::pin(futures_util::stream::iter(events))
    }
}

// ---------------------------------------------------------------------------
// Generation fakes
// ---------------------------------------------------------------------------

/// Failure and gating switches shared by the generation fakes.
#[derive(Clone, Default)]
pub struct Switch {
    gate: Option<Arc<Semaphore>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Switch {
    /// A switch whose calls wait until the returned semaphore gets permits.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, what: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Generation(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakePainter {
    pub switch: Switch,
    pub requests: Arc<Mutex<Vec<PaintRequest>>>,
}

impl ImagePainter for FakePainter {
    async fn paint(&self, request: &PaintRequest) -> Result<GeneratedMedia, ProviderError> {
        self.switch.enter("painter").await?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(GeneratedMedia::new(b"png-bytes".to_vec(), "image/png"))
    }

    async fn enhance_prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        Ok(format!("enhanced: {prompt}"))
    }

    async fn change_style(
        &self,
        _image: &GeneratedMedia,
        _prompt: &str,
    ) -> Result<GeneratedMedia, ProviderError> {
        self.switch.enter("painter").await?;
        Ok(GeneratedMedia::new(b"styled-bytes".to_vec(), "image/jpeg"))
    }
}

#[derive(Clone, Default)]
pub struct FakeVoice {
    pub switch: Switch,
    pub designs: Arc<Mutex<Vec<VoiceDesign>>>,
}

impl VoiceSynthesizer for FakeVoice {
    async fn design_voice(&self, design: &VoiceDesign) -> Result<DesignedVoice, ProviderError> {
        self.switch.enter("voice").await?;
        let mut designs = self.designs.lock().unwrap();
        designs.push(design.clone());
        Ok(DesignedVoice {
            provider: "fake".to_string(),
            voice_id: format!("voice-{}", designs.len()),
        })
    }

    async fn text_to_speech(&self, _voice_id: &str, _text: &str) -> Result<GeneratedMedia, ProviderError> {
        Ok(GeneratedMedia::new(b"mp3-bytes".to_vec(), "audio/mpeg"))
    }
}

#[derive(Clone, Default)]
pub struct FakeVideo {
    pub switch: Switch,
}

impl VideoProducer for FakeVideo {
    async fn create_video(&self, _image_url: &str, _prompt: &str) -> Result<GeneratedMedia, ProviderError> {
        self.switch.enter("video").await?;
        Ok(GeneratedMedia::new(b"mp4-bytes".to_vec(), "video/mp4"))
    }
}

#[derive(Clone, Default)]
pub struct FakeMusic {
    pub switch: Switch,
    pub prompts: Arc<Mutex<Vec<MusicPrompt>>>,
}

impl MusicProducer for FakeMusic {
    async fn produce(&self, prompt: &MusicPrompt) -> Result<GeneratedMedia, ProviderError> {
        self.switch.enter("music").await?;
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok(GeneratedMedia::new(b"mp3-bytes".to_vec(), "audio/mpeg"))
    }
}

/// Blob store keeping artifacts in a map under `mem://blobs/{name}` URLs.
#[derive(Clone, Default)]
pub struct MemoryBlobs {
    blobs: Arc<Mutex<HashMap<String, GeneratedMedia>>>,
}

impl MemoryBlobs {
    pub fn put(&self, url: &str, media: GeneratedMedia) {
        self.blobs.lock().unwrap().insert(url.to_string(), media);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(url)
    }
}

impl BlobStore for MemoryBlobs {
    async fn upload_public(&self, name: &str, bytes: Vec<u8>, mime_type: &str) -> Result<String, ProviderError> {
        let url = format!("mem://blobs/{name}");
        self.put(&url, GeneratedMedia::new(bytes, mime_type));
        Ok(url)
    }

    async fn download(&self, url: &str) -> Result<GeneratedMedia, ProviderError> {
        self.blobs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::Status {
                status: 404,
                body: format!("no blob at {url}"),
            })
    }
}

/// Handles on every generation fake, plus the boxed set services consume.
#[derive(Clone, Default)]
pub struct Fakes {
    pub painter: FakePainter,
    pub voice: FakeVoice,
    pub video: FakeVideo,
    pub music: FakeMusic,
    pub blobs: MemoryBlobs,
}

impl Fakes {
    pub fn generators(&self) -> Generators {
        Generators {
            painter: Arc::new(BoxImagePainter::new(self.painter.clone())),
            voice: Arc::new(BoxVoiceSynthesizer::new(self.voice.clone())),
            video: Arc::new(BoxVideoProducer::new(self.video.clone())),
            music: Arc::new(BoxMusicProducer::new(self.music.clone())),
            blobs: Arc::new(BoxBlobStore::new(self.blobs.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory repositories
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    creations: Vec<AvatarCreation>,
    images: Vec<ImageCreation>,
    characters: Vec<CharacterCreation>,
    voices: Vec<VoiceCreation>,
    chats: Vec<CreationChat>,
    avatars: Vec<Avatar>,
    musics: Vec<AvatarMusic>,
    videos: Vec<AvatarVideo>,
    music_creations: Vec<MusicCreation>,
    video_creations: Vec<VideoCreation>,
    remixes: Vec<AvatarRemix>,
    prompts: Vec<SystemPrompt>,
    usages: Vec<SystemPromptUsage>,
    rejected_attempt_statuses: Vec<CreationStatus>,
    music_statuses: HashMap<Uuid, Vec<ContentStatus>>,
}

impl State {
    fn check_attempt_write(&self, status: CreationStatus) -> Result<(), RepositoryError> {
        if self.rejected_attempt_statuses.contains(&status) {
            return Err(RepositoryError::Query(format!("write of {status} attempt rejected")));
        }
        Ok(())
    }

    fn record_music(&mut self, music: &MusicCreation) {
        self.music_statuses.entry(music.id).or_default().push(music.status);
    }
}

/// Every repository trait over one shared in-memory state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn newest_first<T: Clone>(items: impl DoubleEndedIterator<Item = T>, page: PageRequest) -> Vec<T> {
    items
        .rev()
        .skip(page.offset() as usize)
        .take(page.effective_limit() as usize)
        .collect()
}

fn replace<T: Clone>(items: &mut [T], value: &T, same: impl Fn(&T) -> bool) -> Result<(), RepositoryError> {
    let slot = items.iter_mut().find(|item| same(item)).ok_or(RepositoryError::NotFound)?;
    *slot = value.clone();
    Ok(())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_avatar(&self, avatar: Avatar) {
        self.state.lock().unwrap().avatars.push(avatar);
    }

    pub fn insert_music(&self, music: AvatarMusic) {
        self.state.lock().unwrap().musics.push(music);
    }

    pub fn insert_video(&self, video: AvatarVideo) {
        self.state.lock().unwrap().videos.push(video);
    }

    /// Make every attempt update that writes `status` fail.
    pub fn reject_attempt_status(&self, status: CreationStatus) {
        self.state.lock().unwrap().rejected_attempt_statuses.push(status);
    }

    /// Every status written for music creation `id`, in order.
    pub fn music_statuses(&self, id: &Uuid) -> Vec<ContentStatus> {
        self.state
            .lock()
            .unwrap()
            .music_statuses
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn avatars(&self) -> Vec<Avatar> {
        self.state.lock().unwrap().avatars.clone()
    }

    pub fn chats(&self) -> Vec<CreationChat> {
        self.state.lock().unwrap().chats.clone()
    }

    pub fn image_count(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }
}

impl CreationRepository for MemoryStore {
    async fn create_creation(&self, creation: &AvatarCreation) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().creations.push(creation.clone());
        Ok(())
    }

    async fn get_creation(&self, id: &Uuid) -> Result<Option<AvatarCreation>, RepositoryError> {
        Ok(self.state.lock().unwrap().creations.iter().find(|c| c.id == *id).cloned())
    }

    async fn list_active_creations(&self, user_id: &str) -> Result<Vec<AvatarCreation>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .creations
            .iter()
            .filter(|c| c.user_id == user_id && c.is_active())
            .cloned()
            .collect())
    }

    async fn update_creation(&self, creation: &AvatarCreation) -> Result<(), RepositoryError> {
        replace(&mut self.state.lock().unwrap().creations, creation, |c| c.id == creation.id)
    }

    async fn insert_image(&self, image: &ImageCreation) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().images.push(image.clone());
        Ok(())
    }

    async fn update_image(&self, image: &ImageCreation) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_attempt_write(image.status)?;
        replace(&mut state.images, image, |c| c.id == image.id)
    }

    async fn list_images(&self, creation_id: &Uuid) -> Result<Vec<ImageCreation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.images.iter().filter(|c| c.creation_id == *creation_id).cloned().collect())
    }

    async fn insert_character(&self, character: &CharacterCreation) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().characters.push(character.clone());
        Ok(())
    }

    async fn update_character(&self, character: &CharacterCreation) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_attempt_write(character.status)?;
        replace(&mut state.characters, character, |c| c.id == character.id)
    }

    async fn list_characters(&self, creation_id: &Uuid) -> Result<Vec<CharacterCreation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.characters.iter().filter(|c| c.creation_id == *creation_id).cloned().collect())
    }

    async fn insert_voice(&self, voice: &VoiceCreation) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().voices.push(voice.clone());
        Ok(())
    }

    async fn update_voice(&self, voice: &VoiceCreation) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_attempt_write(voice.status)?;
        replace(&mut state.voices, voice, |c| c.id == voice.id)
    }

    async fn list_voices(&self, creation_id: &Uuid) -> Result<Vec<VoiceCreation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.voices.iter().filter(|c| c.creation_id == *creation_id).cloned().collect())
    }

    async fn save_chat(&self, chat: &CreationChat) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().chats.push(chat.clone());
        Ok(())
    }

    async fn list_chats(
        &self,
        creation_id: &Uuid,
        object_type: Option<ObjectType>,
    ) -> Result<Vec<CreationChat>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .chats
            .iter()
            .filter(|c| c.creation_id == *creation_id)
            .filter(|c| object_type.is_none_or(|t| c.object_type == t))
            .cloned()
            .collect())
    }

    async fn publish_avatar(
        &self,
        creation_id: &Uuid,
        attempts: &PublishedAttempts,
        avatar: &Avatar,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.avatars.iter().any(|a| a.id == avatar.id) {
            return Err(RepositoryError::Conflict(format!("avatar '{}' already exists", avatar.id)));
        }
        if state.avatars.iter().any(|a| a.avatar_creation_id == Some(*creation_id)) {
            return Err(RepositoryError::Conflict(
                "creation session already published an avatar".to_string(),
            ));
        }
        let latest = |rows: Vec<(u32, Uuid, CreationStatus)>, expected: Uuid| {
            rows.into_iter()
                .max_by_key(|(attempt, ..)| *attempt)
                .is_some_and(|(_, id, status)| id == expected && status == CreationStatus::Completed)
        };
        let images = state.images.iter().filter(|c| c.creation_id == *creation_id);
        let characters = state.characters.iter().filter(|c| c.creation_id == *creation_id);
        let voices = state.voices.iter().filter(|c| c.creation_id == *creation_id);
        let current = latest(images.map(|c| (c.attempt, c.id, c.status)).collect(), attempts.image)
            && latest(characters.map(|c| (c.attempt, c.id, c.status)).collect(), attempts.character)
            && latest(voices.map(|c| (c.attempt, c.id, c.status)).collect(), attempts.voice);
        if !current {
            return Err(RepositoryError::Conflict(
                "published attempts are no longer the latest completed ones".to_string(),
            ));
        }
        let creation = state
            .creations
            .iter_mut()
            .find(|c| c.id == *creation_id)
            .ok_or(RepositoryError::NotFound)?;
        if !creation.can_publish() {
            return Err(RepositoryError::Conflict("creation session is not active".to_string()));
        }
        creation.status = CreationStatus::Completed;
        creation.updated_at = Utc::now();
        state.avatars.push(avatar.clone());
        Ok(())
    }
}

impl AvatarRepository for MemoryStore {
    async fn get_avatar(&self, id: &str) -> Result<Option<Avatar>, RepositoryError> {
        Ok(self.state.lock().unwrap().avatars.iter().find(|a| a.id == id).cloned())
    }

    async fn list_avatars(&self, page: PageRequest) -> Result<Vec<Avatar>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(newest_first(state.avatars.iter().cloned(), page))
    }

    async fn get_music(&self, id: &str) -> Result<Option<AvatarMusic>, RepositoryError> {
        Ok(self.state.lock().unwrap().musics.iter().find(|m| m.id == id).cloned())
    }

    async fn list_musics(&self, avatar_id: &str, page: PageRequest) -> Result<Vec<AvatarMusic>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let items: Vec<_> = state.musics.iter().filter(|m| avatar_id.is_empty() || m.avatar_id == avatar_id).cloned().collect();
        Ok(newest_first(items.into_iter(), page))
    }

    async fn get_video(&self, id: &str) -> Result<Option<AvatarVideo>, RepositoryError> {
        Ok(self.state.lock().unwrap().videos.iter().find(|v| v.id == id).cloned())
    }

    async fn list_videos(&self, avatar_id: &str, page: PageRequest) -> Result<Vec<AvatarVideo>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let items: Vec<_> = state.videos.iter().filter(|v| avatar_id.is_empty() || v.avatar_id == avatar_id).cloned().collect();
        Ok(newest_first(items.into_iter(), page))
    }
}

impl ContentRepository for MemoryStore {
    async fn create_music(&self, music: &MusicCreation) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.record_music(music);
        state.music_creations.push(music.clone());
        Ok(())
    }

    async fn get_music_creation(&self, id: &Uuid) -> Result<Option<MusicCreation>, RepositoryError> {
        Ok(self.state.lock().unwrap().music_creations.iter().find(|m| m.id == *id).cloned())
    }

    async fn list_music_creations(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> Result<Vec<MusicCreation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let items: Vec<_> = state
            .music_creations
            .iter()
            .filter(|m| m.user_id == user_id && (avatar_id.is_empty() || m.avatar_id == avatar_id))
            .cloned()
            .collect();
        Ok(newest_first(items.into_iter(), page))
    }

    async fn update_music(&self, music: &MusicCreation, expected: ContentStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .music_creations
            .iter_mut()
            .find(|m| m.id == music.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != expected {
            return Err(RepositoryError::Conflict(format!("status is {}", slot.status)));
        }
        *slot = music.clone();
        state.record_music(music);
        Ok(())
    }

    async fn publish_music(
        &self,
        music: &MusicCreation,
        expected: ContentStatus,
        published: &AvatarMusic,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.musics.iter().any(|m| m.id == published.id) {
            return Err(RepositoryError::Conflict(format!("music '{}' already exists", published.id)));
        }
        let slot = state
            .music_creations
            .iter_mut()
            .find(|m| m.id == music.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != expected {
            return Err(RepositoryError::Conflict(format!("status is {}", slot.status)));
        }
        *slot = music.clone();
        state.record_music(music);
        state.musics.push(published.clone());
        Ok(())
    }

    async fn create_video(&self, video: &VideoCreation) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().video_creations.push(video.clone());
        Ok(())
    }

    async fn get_video_creation(&self, id: &Uuid) -> Result<Option<VideoCreation>, RepositoryError> {
        Ok(self.state.lock().unwrap().video_creations.iter().find(|v| v.id == *id).cloned())
    }

    async fn list_video_creations(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> Result<Vec<VideoCreation>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let items: Vec<_> = state
            .video_creations
            .iter()
            .filter(|v| v.user_id == user_id && (avatar_id.is_empty() || v.avatar_id == avatar_id))
            .cloned()
            .collect();
        Ok(newest_first(items.into_iter(), page))
    }

    async fn update_video(&self, video: &VideoCreation, expected: ContentStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .video_creations
            .iter_mut()
            .find(|v| v.id == video.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != expected {
            return Err(RepositoryError::Conflict(format!("status is {}", slot.status)));
        }
        *slot = video.clone();
        Ok(())
    }

    async fn publish_video(
        &self,
        video: &VideoCreation,
        expected: ContentStatus,
        published: &AvatarVideo,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.videos.iter().any(|v| v.id == published.id) {
            return Err(RepositoryError::Conflict(format!("video '{}' already exists", published.id)));
        }
        let slot = state
            .video_creations
            .iter_mut()
            .find(|v| v.id == video.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != expected {
            return Err(RepositoryError::Conflict(format!("status is {}", slot.status)));
        }
        *slot = video.clone();
        state.videos.push(published.clone());
        Ok(())
    }
}

impl RemixRepository for MemoryStore {
    async fn create_remix(&self, remix: &AvatarRemix) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().remixes.push(remix.clone());
        Ok(())
    }

    async fn get_remix(&self, id: &Uuid) -> Result<Option<AvatarRemix>, RepositoryError> {
        Ok(self.state.lock().unwrap().remixes.iter().find(|r| r.id == *id).cloned())
    }

    async fn list_remixes(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> Result<Vec<AvatarRemix>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let items: Vec<_> = state
            .remixes
            .iter()
            .filter(|r| r.user_id == user_id && (avatar_id.is_empty() || r.avatar_id == avatar_id))
            .cloned()
            .collect();
        Ok(newest_first(items.into_iter(), page))
    }

    async fn update_remix(&self, remix: &AvatarRemix, expected: RemixStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .remixes
            .iter_mut()
            .find(|r| r.id == remix.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != expected {
            return Err(RepositoryError::Conflict(format!("status is {}", slot.status)));
        }
        *slot = remix.clone();
        Ok(())
    }

    async fn publish_remix(
        &self,
        remix: &AvatarRemix,
        expected: RemixStatus,
        avatar: &Avatar,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.avatars.iter().any(|a| a.id == avatar.id) {
            return Err(RepositoryError::Conflict(format!("avatar '{}' already exists", avatar.id)));
        }
        let slot = state
            .remixes
            .iter_mut()
            .find(|r| r.id == remix.id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != expected {
            return Err(RepositoryError::Conflict(format!("status is {}", slot.status)));
        }
        *slot = remix.clone();
        state.avatars.push(avatar.clone());
        Ok(())
    }
}

impl PromptRepository for MemoryStore {
    async fn upsert_prompt(&self, prompt: &SystemPrompt) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        match state.prompts.iter_mut().find(|p| p.id == prompt.id) {
            Some(existing) => *existing = prompt.clone(),
            None => state.prompts.push(prompt.clone()),
        }
        Ok(())
    }

    async fn get_prompt(&self, id: &str) -> Result<Option<SystemPrompt>, RepositoryError> {
        Ok(self.state.lock().unwrap().prompts.iter().find(|p| p.id == id).cloned())
    }

    async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, RepositoryError> {
        Ok(self.state.lock().unwrap().prompts.clone())
    }

    async fn delete_prompt(&self, id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.usages.retain(|u| u.prompt_id != id);
        state.prompts.retain(|p| p.id != id);
        Ok(())
    }

    async fn set_usage(&self, usage: &SystemPromptUsage) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.usages.retain(|u| u.agent_id != usage.agent_id);
        state.usages.push(usage.clone());
        Ok(())
    }

    async fn list_usages(&self) -> Result<Vec<SystemPromptUsage>, RepositoryError> {
        Ok(self.state.lock().unwrap().usages.clone())
    }

    async fn delete_usage(&self, agent: Agent) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().usages.retain(|u| u.agent_id != agent);
        Ok(())
    }

    async fn prompt_for_agent(&self, agent: Agent) -> Result<Option<SystemPrompt>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .usages
            .iter()
            .find(|u| u.agent_id == agent)
            .and_then(|u| state.prompts.iter().find(|p| p.id == u.prompt_id))
            .cloned())
    }
}
