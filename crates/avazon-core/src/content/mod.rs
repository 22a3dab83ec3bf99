//! Derivative content pipelines for published avatars.
//!
//! - `MusicService`: album image + track, chained in one request
//! - `VideoService`: thumbnail first, video on a second request
//! - `RemixService`: style transfer of the avatar's profile image
//! - `CatalogService`: read-only access to published avatars and content
//!
//! Every pipeline step persists its `*_progressing` status before calling a
//! provider and records provider errors as the row's `failed_reason`.
//! Nothing is retried.

pub mod catalog;
pub mod music;
pub mod remix;
pub mod video;

pub use catalog::{CatalogService, PublishedContent};
pub use music::MusicService;
pub use remix::RemixService;
pub use video::VideoService;

use thiserror::Error;

use avazon_types::error::{ContentError, PromptError, ProviderError};

/// Why a background step stopped.
#[derive(Debug, Error)]
pub(crate) enum StepError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<avazon_types::error::RepositoryError> for StepError {
    fn from(err: avazon_types::error::RepositoryError) -> Self {
        StepError::Content(err.into())
    }
}

impl From<avazon_types::status::TransitionError> for StepError {
    fn from(err: avazon_types::status::TransitionError) -> Self {
        StepError::Content(err.into())
    }
}

/// Text stored as `failed_reason`; never empty.
pub(crate) fn failure_reason(err: &StepError) -> String {
    let reason = err.to_string();
    if reason.trim().is_empty() {
        "unknown error".to_string()
    } else {
        reason
    }
}

/// Empty filter means every avatar.
pub(crate) fn avatar_filter(avatar_id: Option<&str>) -> &str {
    avatar_id.map(str::trim).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reason_is_never_empty() {
        let err = StepError::Provider(ProviderError::Request(String::new()));
        assert_eq!(failure_reason(&err), "request failed: ");
        let err = StepError::Prompt(PromptError::Completion(" ".into()));
        assert!(!failure_reason(&err).is_empty());
    }

    #[test]
    fn avatar_filter_defaults_to_all() {
        assert_eq!(avatar_filter(None), "");
        assert_eq!(avatar_filter(Some(" a1 ")), "a1");
    }
}
