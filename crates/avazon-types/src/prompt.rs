//! System prompt registry types.
//!
//! Prompts are stored once and assigned to logical agents through
//! [`SystemPromptUsage`], so a prompt can be swapped without a deploy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Logical agents that run through a named system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    #[serde(rename = "avatar_image_create_chat")]
    ImageChat,
    #[serde(rename = "avatar_character_create_chat")]
    CharacterChat,
    #[serde(rename = "avatar_voice_create_chat")]
    VoiceChat,
    #[serde(rename = "avatar_character_create")]
    CharacterCreate,
    #[serde(rename = "avatar_character_edit")]
    CharacterEdit,
    #[serde(rename = "avatar_voice_create")]
    VoiceCreate,
    #[serde(rename = "avatar_voice_edit")]
    VoiceEdit,
    #[serde(rename = "avatar_introduce")]
    Introduce,
    #[serde(rename = "avatar_chat_video_prompt")]
    VideoPrompt,
    #[serde(rename = "music_summarizer")]
    MusicSummarizer,
    #[serde(rename = "music_image_prompt_create")]
    MusicImagePrompt,
    #[serde(rename = "music_create")]
    MusicCreate,
}

impl Agent {
    pub const ALL: [Agent; 12] = [
        Agent::ImageChat,
        Agent::CharacterChat,
        Agent::VoiceChat,
        Agent::CharacterCreate,
        Agent::CharacterEdit,
        Agent::VoiceCreate,
        Agent::VoiceEdit,
        Agent::Introduce,
        Agent::VideoPrompt,
        Agent::MusicSummarizer,
        Agent::MusicImagePrompt,
        Agent::MusicCreate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::ImageChat => "avatar_image_create_chat",
            Agent::CharacterChat => "avatar_character_create_chat",
            Agent::VoiceChat => "avatar_voice_create_chat",
            Agent::CharacterCreate => "avatar_character_create",
            Agent::CharacterEdit => "avatar_character_edit",
            Agent::VoiceCreate => "avatar_voice_create",
            Agent::VoiceEdit => "avatar_voice_edit",
            Agent::Introduce => "avatar_introduce",
            Agent::VideoPrompt => "avatar_chat_video_prompt",
            Agent::MusicSummarizer => "music_summarizer",
            Agent::MusicImagePrompt => "music_image_prompt_create",
            Agent::MusicCreate => "music_create",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Agent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Agent::ALL
            .into_iter()
            .find(|agent| agent.as_str() == s)
            .ok_or_else(|| format!("invalid agent: '{s}'"))
    }
}

/// A stored system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub id: String,
    pub prompt: String,
    pub used_for: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment of a prompt to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptUsage {
    pub agent_id: Agent,
    pub prompt_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create-or-replace prompt request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertPromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub used_for: String,
    #[serde(default)]
    pub category: String,
}

impl UpsertPromptRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::new("prompt", "must not be empty"));
        }
        Ok(())
    }
}
