use thiserror::Error;

use crate::creation::ObjectType;
use crate::llm::LlmError;
use crate::status::TransitionError;

/// A request field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors from repository operations (used by trait definitions in avazon-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from external generation capabilities (painter, voice, video,
/// music, blob storage).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("timed out after {0} polls")]
    Timeout(u32),

    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),
}

/// Errors from the avatar creation session engine.
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("creation session not found")]
    NotFound,

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0} creation is blocked: the previous attempt is still in progress")]
    Blocked(ObjectType),

    #[error("image is not completed")]
    ImageNotCompleted,

    #[error("character is not completed")]
    CharacterNotCompleted,

    #[error("voice is not completed")]
    VoiceNotCompleted,

    #[error("creation session is {0}")]
    SessionNotActive(String),

    #[error("creation session is closed")]
    SessionClosed,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("agent error: {0}")]
    Agent(#[from] LlmError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for CreationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => CreationError::NotFound,
            RepositoryError::Conflict(msg) => CreationError::Conflict(msg),
            other => CreationError::Storage(other.to_string()),
        }
    }
}

/// Errors from the music/video/remix content pipelines.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content creation not found")]
    NotFound,

    #[error("avatar not found")]
    AvatarNotFound,

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("content creation has not started yet")]
    NotStarted,

    #[error("previous stage is still processing")]
    StillProcessing,

    #[error("already completed")]
    AlreadyConfirmed,

    #[error("content not completed")]
    ContentNotCompleted,

    #[error("content already created")]
    ContentAlreadyCreated,

    #[error("content creation failed")]
    Failed,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ContentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ContentError::NotFound,
            RepositoryError::Conflict(msg) => ContentError::Conflict(msg),
            other => ContentError::Storage(other.to_string()),
        }
    }
}

/// Errors from the system prompt registry.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("system prompt not found")]
    NotFound,

    #[error("no prompt is assigned to agent '{0}'")]
    Unassigned(String),

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("completion failed: {0}")]
    Completion(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for PromptError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => PromptError::NotFound,
            other => PromptError::Storage(other.to_string()),
        }
    }
}
