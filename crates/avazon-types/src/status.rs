//! Lifecycle state machines for every record that moves through a pipeline.
//!
//! Each status type owns a single transition table (`can_transition_to`).
//! Services never compare status strings directly; they ask the table and
//! receive a [`TransitionError`] for anything the table does not allow.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A status value with a central transition table.
pub trait Lifecycle: Copy + Eq + fmt::Display {
    /// Name used in error messages ("creation", "content", "remix").
    const KIND: &'static str;

    /// Whether `self -> next` is a legal step in the normal flow.
    fn can_transition_to(self, next: Self) -> bool;

    /// Whether no further normal-flow transition leaves this state.
    fn is_terminal(self) -> bool;

    /// Validate `self -> next` against the table.
    fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: Self::KIND,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

/// An illegal status transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {kind} transition: {from} -> {to}")]
pub struct TransitionError {
    pub kind: &'static str,
    pub from: String,
    pub to: String,
}

// ---------------------------------------------------------------------------
// CreationStatus
// ---------------------------------------------------------------------------

/// Status of a creation session and of each image/character/voice attempt.
///
/// `ready -> processing -> completed | failed`, with `ready -> failed` for
/// rows that never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationStatus {
    Ready,
    Processing,
    Completed,
    Failed,
}

impl Lifecycle for CreationStatus {
    const KIND: &'static str = "creation";

    fn can_transition_to(self, next: Self) -> bool {
        use CreationStatus::*;
        matches!(
            (self, next),
            (Ready, Processing) | (Ready, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(self, CreationStatus::Completed | CreationStatus::Failed)
    }
}

impl fmt::Display for CreationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStatus::Ready => write!(f, "ready"),
            CreationStatus::Processing => write!(f, "processing"),
            CreationStatus::Completed => write!(f, "completed"),
            CreationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for CreationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ready" => Ok(CreationStatus::Ready),
            "processing" => Ok(CreationStatus::Processing),
            "completed" => Ok(CreationStatus::Completed),
            "failed" => Ok(CreationStatus::Failed),
            other => Err(format!("invalid creation status: '{other}'")),
        }
    }
}

impl Default for CreationStatus {
    fn default() -> Self {
        CreationStatus::Ready
    }
}

// ---------------------------------------------------------------------------
// ContentStatus
// ---------------------------------------------------------------------------

/// Status of a music or video content creation.
///
/// Normal path:
/// `yet -> image_progressing -> image_completed -> content_progressing ->
/// content_completed -> confirmed`. `failed` is reachable from every
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Yet,
    ImageProgressing,
    ImageCompleted,
    ContentProgressing,
    ContentCompleted,
    Confirmed,
    Failed,
}

impl ContentStatus {
    /// Whether a provider call is currently running for this record.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ContentStatus::ImageProgressing | ContentStatus::ContentProgressing
        )
    }

    /// Whether the image sub-step may be re-run from this state.
    ///
    /// Regeneration is the one deliberate way back along the path.
    pub fn can_regenerate_image(self) -> bool {
        matches!(
            self,
            ContentStatus::ImageCompleted | ContentStatus::ContentCompleted | ContentStatus::Failed
        )
    }

    /// Status a regenerated record settles in once the new image is stored.
    pub fn after_image_regenerated(has_content: bool) -> Self {
        if has_content {
            ContentStatus::ContentCompleted
        } else {
            ContentStatus::ImageCompleted
        }
    }
}

impl Lifecycle for ContentStatus {
    const KIND: &'static str = "content";

    fn can_transition_to(self, next: Self) -> bool {
        use ContentStatus::*;
        match (self, next) {
            (Yet, ImageProgressing)
            | (ImageProgressing, ImageCompleted)
            | (ImageCompleted, ContentProgressing)
            | (ContentProgressing, ContentCompleted)
            | (ContentCompleted, Confirmed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, ContentStatus::Confirmed | ContentStatus::Failed)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentStatus::Yet => write!(f, "yet"),
            ContentStatus::ImageProgressing => write!(f, "image_progressing"),
            ContentStatus::ImageCompleted => write!(f, "image_completed"),
            ContentStatus::ContentProgressing => write!(f, "content_progressing"),
            ContentStatus::ContentCompleted => write!(f, "content_completed"),
            ContentStatus::Confirmed => write!(f, "confirmed"),
            ContentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yet" => Ok(ContentStatus::Yet),
            "image_progressing" => Ok(ContentStatus::ImageProgressing),
            "image_completed" => Ok(ContentStatus::ImageCompleted),
            "content_progressing" => Ok(ContentStatus::ContentProgressing),
            "content_completed" => Ok(ContentStatus::ContentCompleted),
            "confirmed" => Ok(ContentStatus::Confirmed),
            "failed" => Ok(ContentStatus::Failed),
            other => Err(format!("invalid content status: '{other}'")),
        }
    }
}

impl Default for ContentStatus {
    fn default() -> Self {
        ContentStatus::Yet
    }
}

// ---------------------------------------------------------------------------
// RemixStatus
// ---------------------------------------------------------------------------

/// Status of an avatar image remix: `yet -> progressing -> completed | failed`,
/// then `completed -> confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemixStatus {
    Yet,
    Progressing,
    Completed,
    Failed,
    Confirmed,
}

impl Lifecycle for RemixStatus {
    const KIND: &'static str = "remix";

    fn can_transition_to(self, next: Self) -> bool {
        use RemixStatus::*;
        matches!(
            (self, next),
            (Yet, Progressing)
                | (Yet, Failed)
                | (Progressing, Completed)
                | (Progressing, Failed)
                | (Completed, Confirmed)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(self, RemixStatus::Failed | RemixStatus::Confirmed)
    }
}

impl fmt::Display for RemixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemixStatus::Yet => write!(f, "yet"),
            RemixStatus::Progressing => write!(f, "progressing"),
            RemixStatus::Completed => write!(f, "completed"),
            RemixStatus::Failed => write!(f, "failed"),
            RemixStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl FromStr for RemixStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yet" => Ok(RemixStatus::Yet),
            "progressing" => Ok(RemixStatus::Progressing),
            "completed" => Ok(RemixStatus::Completed),
            "failed" => Ok(RemixStatus::Failed),
            "confirmed" => Ok(RemixStatus::Confirmed),
            other => Err(format!("invalid remix status: '{other}'")),
        }
    }
}

impl Default for RemixStatus {
    fn default() -> Self {
        RemixStatus::Yet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_ALL: [ContentStatus; 7] = [
        ContentStatus::Yet,
        ContentStatus::ImageProgressing,
        ContentStatus::ImageCompleted,
        ContentStatus::ContentProgressing,
        ContentStatus::ContentCompleted,
        ContentStatus::Confirmed,
        ContentStatus::Failed,
    ];

    #[test]
    fn content_happy_path_is_allowed() {
        let mut status = ContentStatus::Yet;
        for next in &CONTENT_ALL[1..6] {
            status = status.transition(*next).unwrap();
        }
        assert_eq!(status, ContentStatus::Confirmed);
    }

    #[test]
    fn content_never_moves_backward() {
        for (i, from) in CONTENT_ALL[..6].iter().enumerate() {
            for to in &CONTENT_ALL[..i] {
                assert!(!from.can_transition_to(*to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn content_cannot_skip_steps() {
        assert!(!ContentStatus::Yet.can_transition_to(ContentStatus::ImageCompleted));
        assert!(!ContentStatus::ImageCompleted.can_transition_to(ContentStatus::ContentCompleted));
        assert!(!ContentStatus::ImageCompleted.can_transition_to(ContentStatus::Confirmed));
    }

    #[test]
    fn content_failed_only_from_non_terminal() {
        for from in CONTENT_ALL {
            let allowed = from.can_transition_to(ContentStatus::Failed);
            assert_eq!(allowed, !from.is_terminal(), "{from} -> failed");
        }
    }

    #[test]
    fn content_transition_error_message() {
        let err = ContentStatus::Confirmed
            .transition(ContentStatus::Failed)
            .unwrap_err();
        assert_eq!(err.to_string(), "illegal content transition: confirmed -> failed");
    }

    #[test]
    fn content_regenerate_rules() {
        assert!(ContentStatus::ContentCompleted.can_regenerate_image());
        assert!(!ContentStatus::Confirmed.can_regenerate_image());
        assert!(!ContentStatus::ImageProgressing.can_regenerate_image());
        assert!(!ContentStatus::Yet.can_regenerate_image());
        assert_eq!(
            ContentStatus::after_image_regenerated(true),
            ContentStatus::ContentCompleted
        );
        assert_eq!(
            ContentStatus::after_image_regenerated(false),
            ContentStatus::ImageCompleted
        );
    }

    #[test]
    fn creation_status_table() {
        assert!(CreationStatus::Ready.can_transition_to(CreationStatus::Processing));
        assert!(CreationStatus::Processing.can_transition_to(CreationStatus::Completed));
        assert!(!CreationStatus::Completed.can_transition_to(CreationStatus::Processing));
        assert!(!CreationStatus::Failed.can_transition_to(CreationStatus::Completed));
        assert!(!CreationStatus::Ready.can_transition_to(CreationStatus::Completed));
    }

    #[test]
    fn remix_status_table() {
        assert!(RemixStatus::Yet.can_transition_to(RemixStatus::Progressing));
        assert!(RemixStatus::Completed.can_transition_to(RemixStatus::Confirmed));
        assert!(!RemixStatus::Failed.can_transition_to(RemixStatus::Confirmed));
        assert!(!RemixStatus::Progressing.can_transition_to(RemixStatus::Confirmed));
    }

    #[test]
    fn status_string_roundtrip() {
        for status in CONTENT_ALL {
            let parsed: ContentStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        for status in [
            CreationStatus::Ready,
            CreationStatus::Processing,
            CreationStatus::Completed,
            CreationStatus::Failed,
        ] {
            let parsed: CreationStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("bogus".parse::<RemixStatus>().is_err());
    }
}
