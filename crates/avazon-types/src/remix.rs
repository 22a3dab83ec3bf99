//! Avatar image remix (style transfer) records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::RemixStatus;

/// Subject description used when the caller does not supply one.
pub const DEFAULT_REMIX_PROMPT: &str = "the same character in a fresh artistic style";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemixRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// A style-transfer variant of an avatar's profile image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarRemix {
    pub id: Uuid,
    pub user_id: String,
    pub avatar_id: String,
    pub prompt: String,
    pub image_url: Option<String>,
    pub status: RemixStatus,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvatarRemix {
    pub fn new(user_id: impl Into<String>, avatar_id: impl Into<String>, request: RemixRequest) -> Self {
        let now = Utc::now();
        let prompt = request
            .prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REMIX_PROMPT.to_string());
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            avatar_id: avatar_id.into(),
            prompt,
            image_url: None,
            status: RemixStatus::Yet,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
