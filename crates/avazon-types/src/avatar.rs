//! Published avatar artifacts.
//!
//! These records are immutable once written. Their `id` is supplied by the
//! caller (an external, content-addressed key) rather than generated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Default and maximum page sizes for list endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A published synthetic persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: String,
    pub user_id: String,
    pub avatar_creation_id: Option<Uuid>,
    pub remix_avatar_id: Option<String>,
    pub name: String,
    pub species: String,
    pub gender: String,
    pub language: String,
    pub country: String,
    pub description: Option<String>,
    pub profile_image_url: String,
    pub voice_id: Option<String>,
    pub voice_url: String,
    pub character_description: String,
    pub created_at: DateTime<Utc>,
}

/// Published music made for an avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarMusic {
    pub id: String,
    pub title: String,
    pub avatar_id: String,
    pub album_image_url: String,
    pub music_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Published video made for an avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarVideo {
    pub id: String,
    pub title: String,
    pub avatar_id: String,
    pub thumbnail_url: String,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The two kinds of derivative content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Music,
    Video,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Music => write!(f, "music"),
            ContentKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "music" => Ok(ContentKind::Music),
            "video" => Ok(ContentKind::Video),
            other => Err(format!("invalid content kind: '{other}'")),
        }
    }
}

/// Zero-based paging parameters. Lists are ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.page.saturating_mul(self.effective_limit())
    }
}
