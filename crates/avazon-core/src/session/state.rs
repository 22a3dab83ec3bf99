//! Shared state of one creation session.
//!
//! `SessionCore` is held by the session handle, the three object actors and
//! every running job. The attempt lists sit behind one async mutex so that
//! the `can_create_now` check and the new row's insert happen atomically.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use avazon_types::chat::{CreationChat, transcript};
use avazon_types::creation::{
    AvatarCreation, AvatarCreationDetail, CharacterCreation, CreationProgress, CreationStep,
    ImageCreation, ObjectType, SubObject, VoiceCreation,
};
use avazon_types::error::CreationError;
use avazon_types::status::{CreationStatus, Lifecycle};
use avazon_types::tool::ToolCall;

use crate::generation::Generators;
use crate::prompt::BoxPromptRegistry;
use crate::repository::creation::CreationRepository;

use super::events::{EventSink, SessionEvent};
use super::jobs;

const PROGRESS_BUFFER: usize = 16;

/// In-memory attempt lists, re-derived from the store on load.
#[derive(Debug, Default)]
pub(crate) struct Attempts {
    images: Vec<ImageCreation>,
    characters: Vec<CharacterCreation>,
    voices: Vec<VoiceCreation>,
}

impl Attempts {
    fn count(&self, object_type: ObjectType) -> u32 {
        let len = match object_type {
            ObjectType::Image => self.images.len(),
            ObjectType::Character => self.characters.len(),
            ObjectType::Voice => self.voices.len(),
        };
        len as u32
    }

    fn latest_status(&self, object_type: ObjectType) -> Option<CreationStatus> {
        match object_type {
            ObjectType::Image => self.images.last().map(|c| c.status),
            ObjectType::Character => self.characters.last().map(|c| c.status),
            ObjectType::Voice => self.voices.last().map(|c| c.status),
        }
    }

    /// No attempt yet, or the latest one has finished either way.
    fn can_create_now(&self, object_type: ObjectType) -> bool {
        self.latest_status(object_type)
            .is_none_or(|status| status.is_terminal())
    }

    fn push(&mut self, row: SubObject) {
        match row {
            SubObject::Image(c) => self.images.push(c),
            SubObject::Character(c) => self.characters.push(c),
            SubObject::Voice(c) => self.voices.push(c),
        }
    }

    fn replace(&mut self, row: SubObject) {
        match row {
            SubObject::Image(c) => {
                if let Some(slot) = self.images.iter_mut().find(|r| r.id == c.id) {
                    *slot = c;
                }
            }
            SubObject::Character(c) => {
                if let Some(slot) = self.characters.iter_mut().find(|r| r.id == c.id) {
                    *slot = c;
                }
            }
            SubObject::Voice(c) => {
                if let Some(slot) = self.voices.iter_mut().find(|r| r.id == c.id) {
                    *slot = c;
                }
            }
        }
    }
}

pub struct SessionCore<R: CreationRepository> {
    id: Uuid,
    user_id: String,
    pub(crate) repo: Arc<R>,
    pub(crate) prompts: Arc<BoxPromptRegistry>,
    pub(crate) generators: Generators,
    creation: Mutex<AvatarCreation>,
    attempts: tokio::sync::Mutex<Attempts>,
    events: EventSink,
    last_active: Mutex<Instant>,
    closed: CancellationToken,
}

impl<R: CreationRepository + 'static> SessionCore<R> {
    /// Load a session and its attempts from the store.
    pub async fn load(
        id: Uuid,
        repo: Arc<R>,
        prompts: Arc<BoxPromptRegistry>,
        generators: Generators,
        event_capacity: usize,
    ) -> Result<Self, CreationError> {
        let creation = repo.get_creation(&id).await?.ok_or(CreationError::NotFound)?;
        let attempts = Attempts {
            images: repo.list_images(&id).await?,
            characters: repo.list_characters(&id).await?,
            voices: repo.list_voices(&id).await?,
        };

        Ok(Self {
            id,
            user_id: creation.user_id.clone(),
            repo,
            prompts,
            generators,
            creation: Mutex::new(creation),
            attempts: tokio::sync::Mutex::new(attempts),
            events: EventSink::new(event_capacity),
            last_active: Mutex::new(Instant::now()),
            closed: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn snapshot(&self) -> AvatarCreation {
        self.creation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The base profile the generation agents start from.
    pub fn profile(&self) -> String {
        self.creation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .profile()
    }

    pub async fn detail(&self) -> AvatarCreationDetail {
        let attempts = self.attempts.lock().await;
        AvatarCreationDetail {
            creation: self.snapshot(),
            images: attempts.images.clone(),
            characters: attempts.characters.clone(),
            voices: attempts.voices.clone(),
        }
    }

    // -- activity ----------------------------------------------------------

    pub fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Stop the actors and cancel in-flight completion streams.
    ///
    /// Running jobs keep going and persist; their progress is no longer
    /// delivered.
    pub fn shutdown(&self) {
        self.closed.cancel();
        self.events.detach();
    }

    pub fn ensure_open(&self) -> Result<(), CreationError> {
        if self.is_closed() {
            return Err(CreationError::SessionClosed);
        }
        let status = self
            .creation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status;
        if !matches!(status, CreationStatus::Ready | CreationStatus::Processing) {
            return Err(CreationError::SessionNotActive(status.to_string()));
        }
        Ok(())
    }

    // -- events ------------------------------------------------------------

    pub fn attach(&self) -> mpsc::Receiver<SessionEvent> {
        self.events.attach()
    }

    pub async fn emit(&self, event: SessionEvent) {
        self.events.send(event).await;
    }

    // -- session status ----------------------------------------------------

    /// Move the session to `next` and persist it.
    pub async fn set_status(
        &self,
        next: CreationStatus,
        reason: Option<String>,
    ) -> Result<AvatarCreation, CreationError> {
        let mut updated = self.snapshot();
        updated.status = updated.status.transition(next)?;
        updated.failed_reason = reason;
        updated.updated_at = Utc::now();
        updated.last_active_at = updated.updated_at;
        self.repo.update_creation(&updated).await?;

        *self.creation.lock().unwrap_or_else(PoisonError::into_inner) = updated.clone();
        info!(session_id = %self.id, status = %updated.status, "creation session status changed");
        Ok(updated)
    }

    // -- attempts ----------------------------------------------------------

    pub async fn can_create_now(&self, object_type: ObjectType) -> bool {
        self.attempts.lock().await.can_create_now(object_type)
    }

    /// Number of attempts so far; also the index the next attempt will get.
    pub async fn attempt_count(&self, object_type: ObjectType) -> u32 {
        self.attempts.lock().await.count(object_type)
    }

    pub(crate) async fn previous_character(&self, attempt: u32) -> Option<String> {
        let attempts = self.attempts.lock().await;
        let previous = attempt.checked_sub(1)? as usize;
        attempts.characters.get(previous)?.generated_character.clone()
    }

    pub(crate) async fn previous_voice_prompt(&self, attempt: u32) -> Option<String> {
        let attempts = self.attempts.lock().await;
        let previous = attempt.checked_sub(1)? as usize;
        attempts.voices.get(previous)?.generated_prompt.clone()
    }

    /// Start a generation job for `call`.
    ///
    /// Rejects with `Blocked` while the latest attempt of the same type is
    /// still running. Otherwise persists a `ready` row and returns it with a
    /// progress receiver; the job then runs on its own task.
    pub async fn start_job(
        self: &Arc<Self>,
        call: ToolCall,
    ) -> Result<(SubObject, mpsc::Receiver<CreationProgress>), CreationError> {
        self.ensure_open()?;
        let object_type = call.object_type();

        let row = {
            let mut attempts = self.attempts.lock().await;
            if !attempts.can_create_now(object_type) {
                return Err(CreationError::Blocked(object_type));
            }
            let attempt = attempts.count(object_type);
            let row = match call {
                ToolCall::CreateImage(params) => {
                    SubObject::Image(ImageCreation::new(self.id, attempt, params.summary))
                }
                ToolCall::CreateCharacter => {
                    SubObject::Character(CharacterCreation::new(self.id, attempt))
                }
                ToolCall::CreateVoice(params) => {
                    SubObject::Voice(VoiceCreation::new(self.id, attempt, params))
                }
            };
            match &row {
                SubObject::Image(c) => self.repo.insert_image(c).await?,
                SubObject::Character(c) => self.repo.insert_character(c).await?,
                SubObject::Voice(c) => self.repo.insert_voice(c).await?,
            }
            attempts.push(row.clone());
            row
        };

        info!(
            session_id = %self.id,
            object_type = %object_type,
            attempt = row.attempt(),
            "creation job queued"
        );

        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let _ = tx.try_send(CreationProgress {
            step: CreationStep::Queued,
            creation: row.clone(),
        });
        jobs::spawn(Arc::clone(self), row.clone(), tx);
        Ok((row, rx))
    }

    /// Persist an attempt, then mirror it in memory.
    pub(crate) async fn save_attempt(&self, row: &SubObject) -> Result<(), CreationError> {
        match row {
            SubObject::Image(c) => self.repo.update_image(c).await?,
            SubObject::Character(c) => self.repo.update_character(c).await?,
            SubObject::Voice(c) => self.repo.update_voice(c).await?,
        }
        self.attempts.lock().await.replace(row.clone());
        Ok(())
    }

    /// Mirror a terminal attempt in memory without persisting it, so a row
    /// the store refused to update no longer blocks its object type.
    pub(crate) async fn release_attempt(&self, row: SubObject) {
        self.attempts.lock().await.replace(row);
    }

    // -- chats -------------------------------------------------------------

    pub async fn save_chat(&self, chat: &CreationChat) -> Result<(), CreationError> {
        self.repo.save_chat(chat).await?;
        Ok(())
    }

    /// Plain-text transcript of the turns that led to `attempt`.
    pub(crate) async fn transcript(
        &self,
        object_type: ObjectType,
        attempt: u32,
    ) -> Result<String, CreationError> {
        let chats: Vec<CreationChat> = self
            .repo
            .list_chats(&self.id, Some(object_type))
            .await?
            .into_iter()
            .filter(|c| c.created_object_number == attempt)
            .collect();
        Ok(transcript(&chats))
    }
}
