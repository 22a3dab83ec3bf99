//! Outbound session events and the per-session delivery channel.
//!
//! Each object-type actor sends its events in production order through one
//! bounded mpsc channel. A client (re)attaching replaces the channel; the
//! previous receiver sees end-of-stream.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use avazon_types::creation::{CreationProgress, ObjectType};

/// Which conversation an event belongs to. `All` addresses the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventScope {
    Image,
    Character,
    Voice,
    All,
}

impl EventScope {
    pub fn object_type(self) -> Option<ObjectType> {
        match self {
            EventScope::Image => Some(ObjectType::Image),
            EventScope::Character => Some(ObjectType::Character),
            EventScope::Voice => Some(ObjectType::Voice),
            EventScope::All => None,
        }
    }
}

impl From<ObjectType> for EventScope {
    fn from(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Image => EventScope::Image,
            ObjectType::Character => EventScope::Character,
            ObjectType::Voice => EventScope::Voice,
        }
    }
}

impl fmt::Display for EventScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventScope::Image => write!(f, "image"),
            EventScope::Character => write!(f, "character"),
            EventScope::Voice => write!(f, "voice"),
            EventScope::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionEventKind {
    Chat,
    Chunk,
    Function,
    Creation,
    Close,
    Error,
}

/// One frame sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub object_type: EventScope,
    pub event: SessionEventKind,
    pub content: String,
}

impl SessionEvent {
    pub fn new(object_type: impl Into<EventScope>, event: SessionEventKind, content: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            event,
            content: content.into(),
        }
    }

    pub fn chat(object_type: ObjectType, content: impl Into<String>) -> Self {
        Self::new(object_type, SessionEventKind::Chat, content)
    }

    pub fn chunk(object_type: ObjectType, content: impl Into<String>) -> Self {
        Self::new(object_type, SessionEventKind::Chunk, content)
    }

    pub fn function(object_type: ObjectType, content: impl Into<String>) -> Self {
        Self::new(object_type, SessionEventKind::Function, content)
    }

    /// A job progress snapshot, serialized as JSON.
    pub fn creation(progress: &CreationProgress) -> Self {
        Self::new(
            progress.creation.object_type(),
            SessionEventKind::Creation,
            serde_json::to_string(progress).unwrap_or_default(),
        )
    }

    pub fn error(scope: impl Into<EventScope>, message: impl Into<String>) -> Self {
        Self::new(scope, SessionEventKind::Error, message)
    }

    pub fn closed() -> Self {
        Self::new(EventScope::All, SessionEventKind::Close, "session closed")
    }
}

/// Replaceable sender half of a session's event channel.
pub struct EventSink {
    sender: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    capacity: usize,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: Mutex::new(None),
            capacity: capacity.max(1),
        }
    }

    /// Open a fresh channel, detaching any previous receiver.
    pub fn attach(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn detach(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_attached(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver `event`, waiting for channel capacity. Dropped when no
    /// client is attached.
    pub async fn send(&self, event: SessionEvent) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sender {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    debug!("event receiver gone, dropping event");
                }
            }
            None => debug!(event = ?event.event, "no client attached, dropping event"),
        }
    }
}
