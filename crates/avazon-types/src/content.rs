//! Music and video content creations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::status::ContentStatus;

/// Durations (seconds) the music producer accepts.
pub const MUSIC_DURATIONS: [u32; 2] = [20, 45];

/// Request to create music for an avatar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicRequest {
    pub title: String,
    pub duration: u32,
    pub style: String,
    pub description: String,
}

impl MusicRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "must not be empty"));
        }
        if self.style.trim().is_empty() {
            return Err(ValidationError::new("style", "must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::new("description", "must not be empty"));
        }
        if !MUSIC_DURATIONS.contains(&self.duration) {
            return Err(ValidationError::new(
                "duration",
                format!("must be one of {MUSIC_DURATIONS:?}"),
            ));
        }
        Ok(())
    }

    /// Human-readable summary fed to prompt agents.
    pub fn info(&self) -> String {
        format!(
            "Title: {}\nDuration: {}\nStyle: {}\nDescription: {}",
            self.title, self.duration, self.style, self.description
        )
    }
}

/// A music creation moving through [`ContentStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicCreation {
    pub id: Uuid,
    pub user_id: String,
    pub avatar_id: String,
    pub title: String,
    pub duration: u32,
    pub style: String,
    pub description: String,
    pub generated_image_prompt: Option<String>,
    pub generated_music_prompt: Option<String>,
    pub album_image_url: Option<String>,
    pub music_url: Option<String>,
    pub status: ContentStatus,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MusicCreation {
    pub fn new(user_id: impl Into<String>, avatar_id: impl Into<String>, request: MusicRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            avatar_id: avatar_id.into(),
            title: request.title,
            duration: request.duration,
            style: request.style,
            description: request.description,
            generated_image_prompt: None,
            generated_music_prompt: None,
            album_image_url: None,
            music_url: None,
            status: ContentStatus::Yet,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn request(&self) -> MusicRequest {
        MusicRequest {
            title: self.title.clone(),
            duration: self.duration,
            style: self.style.clone(),
            description: self.description.clone(),
        }
    }
}

/// Request for the first (thumbnail image) step of a video creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoImageRequest {
    pub prompt: String,
}

impl VideoImageRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::new("prompt", "must not be empty"));
        }
        Ok(())
    }
}

/// Request for the second (video) step of a video creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    pub title: String,
    pub prompt: String,
}

impl VideoRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::new("prompt", "must not be empty"));
        }
        Ok(())
    }
}

/// A video creation moving through [`ContentStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCreation {
    pub id: Uuid,
    pub user_id: String,
    pub avatar_id: String,
    pub image_prompt: String,
    pub generated_image_prompt: Option<String>,
    pub thumbnail_image_url: Option<String>,
    pub title: Option<String>,
    pub video_prompt: Option<String>,
    pub video_content_url: Option<String>,
    pub status: ContentStatus,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoCreation {
    pub fn new(user_id: impl Into<String>, avatar_id: impl Into<String>, request: VideoImageRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            avatar_id: avatar_id.into(),
            image_prompt: request.prompt,
            generated_image_prompt: None,
            thumbnail_image_url: None,
            title: None,
            video_prompt: None,
            video_content_url: None,
            status: ContentStatus::Yet,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
