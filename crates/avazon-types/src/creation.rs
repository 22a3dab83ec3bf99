//! Avatar creation session types.
//!
//! A [`AvatarCreation`] is the working record a user co-creates an avatar
//! through. It owns an ordered list of attempts for each object type
//! (image, character, voice); each attempt moves through [`CreationStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::status::CreationStatus;
use crate::tool::{VoiceAccent, VoiceAge, VoiceGender, VoiceParams};

/// The three sub-objects an avatar is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Image,
    Character,
    Voice,
}

impl ObjectType {
    pub const ALL: [ObjectType; 3] = [ObjectType::Image, ObjectType::Character, ObjectType::Voice];
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Image => write!(f, "image"),
            ObjectType::Character => write!(f, "character"),
            ObjectType::Voice => write!(f, "voice"),
        }
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(ObjectType::Image),
            "character" => Ok(ObjectType::Character),
            "voice" => Ok(ObjectType::Voice),
            other => Err(format!("invalid object type: '{other}'")),
        }
    }
}

/// Profile the user supplies when starting a creation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCreationRequest {
    pub name: String,
    pub species: String,
    pub gender: String,
    pub age: u32,
    pub language: String,
    pub country: String,
    pub image_style: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl StartCreationRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("name", &self.name),
            ("species", &self.species),
            ("gender", &self.gender),
            ("language", &self.language),
            ("country", &self.country),
            ("image_style", &self.image_style),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::new(field, "must not be empty"));
            }
        }
        if self.age < 1 {
            return Err(ValidationError::new("age", "must be at least 1"));
        }
        Ok(())
    }
}

/// The working record of an avatar being co-created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarCreation {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub species: String,
    pub gender: String,
    pub age: u32,
    pub language: String,
    pub country: String,
    pub image_style: String,
    pub description: Option<String>,
    pub status: CreationStatus,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl AvatarCreation {
    pub fn new(user_id: impl Into<String>, request: StartCreationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            name: request.name,
            species: request.species,
            gender: request.gender,
            age: request.age,
            language: request.language,
            country: request.country,
            image_style: request.image_style,
            description: request.description,
            status: CreationStatus::Ready,
            failed_reason: None,
            created_at: now,
            updated_at: now,
            last_active_at: now,
        }
    }

    /// A session can receive messages and start jobs while ready or processing.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            CreationStatus::Ready | CreationStatus::Processing
        )
    }

    /// Sessions that may still publish an avatar. A confirmed session keeps
    /// this until its avatar exists.
    pub fn can_publish(&self) -> bool {
        self.is_active() || self.status == CreationStatus::Completed
    }

    /// The base profile used as generation context on a first attempt.
    pub fn profile(&self) -> String {
        let mut profile = format!(
            "Name: {}\nSpecies: {}\nGender: {}\nAge: {}\nLanguage: {}\nCountry: {}\nImage style: {}",
            self.name,
            self.species,
            self.gender,
            self.age,
            self.language,
            self.country,
            self.image_style,
        );
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            profile.push_str("\nDescription: ");
            profile.push_str(description);
        }
        profile
    }
}

/// One image generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCreation {
    pub id: Uuid,
    pub creation_id: Uuid,
    pub attempt: u32,
    pub status: CreationStatus,
    pub summary: String,
    pub generated_prompt: Option<String>,
    pub image_url: Option<String>,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageCreation {
    pub fn new(creation_id: Uuid, attempt: u32, summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            creation_id,
            attempt,
            status: CreationStatus::Ready,
            summary: summary.into(),
            generated_prompt: None,
            image_url: None,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One character (personality text) generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCreation {
    pub id: Uuid,
    pub creation_id: Uuid,
    pub attempt: u32,
    pub status: CreationStatus,
    pub generated_character: Option<String>,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CharacterCreation {
    pub fn new(creation_id: Uuid, attempt: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            creation_id,
            attempt,
            status: CreationStatus::Ready,
            generated_character: None,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One voice generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCreation {
    pub id: Uuid,
    pub creation_id: Uuid,
    pub attempt: u32,
    pub status: CreationStatus,
    pub summary: String,
    pub gender: VoiceGender,
    pub accent: VoiceAccent,
    pub accent_strength: f64,
    pub age: VoiceAge,
    pub generated_prompt: Option<String>,
    pub provider: Option<String>,
    pub voice_id: Option<String>,
    pub sample_text: Option<String>,
    pub voice_url: Option<String>,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoiceCreation {
    pub fn new(creation_id: Uuid, attempt: u32, params: VoiceParams) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            creation_id,
            attempt,
            status: CreationStatus::Ready,
            summary: params.summary,
            gender: params.gender,
            accent: params.accent,
            accent_strength: params.accent_strength,
            age: params.age,
            generated_prompt: None,
            provider: None,
            voice_id: None,
            sample_text: None,
            voice_url: None,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Any of the three attempt kinds, used for progress snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubObject {
    Image(ImageCreation),
    Character(CharacterCreation),
    Voice(VoiceCreation),
}

impl SubObject {
    pub fn object_type(&self) -> ObjectType {
        match self {
            SubObject::Image(_) => ObjectType::Image,
            SubObject::Character(_) => ObjectType::Character,
            SubObject::Voice(_) => ObjectType::Voice,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            SubObject::Image(c) => c.id,
            SubObject::Character(c) => c.id,
            SubObject::Voice(c) => c.id,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            SubObject::Image(c) => c.attempt,
            SubObject::Character(c) => c.attempt,
            SubObject::Voice(c) => c.attempt,
        }
    }

    pub fn status(&self) -> CreationStatus {
        match self {
            SubObject::Image(c) => c.status,
            SubObject::Character(c) => c.status,
            SubObject::Voice(c) => c.status,
        }
    }

    pub fn failed_reason(&self) -> Option<&str> {
        match self {
            SubObject::Image(c) => c.failed_reason.as_deref(),
            SubObject::Character(c) => c.failed_reason.as_deref(),
            SubObject::Voice(c) => c.failed_reason.as_deref(),
        }
    }
}

/// A creation session together with all of its attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarCreationDetail {
    #[serde(flatten)]
    pub creation: AvatarCreation,
    pub images: Vec<ImageCreation>,
    pub characters: Vec<CharacterCreation>,
    pub voices: Vec<VoiceCreation>,
}

/// Named step a generation job reports alongside each status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStep {
    Queued,
    Started,
    PromptEnhanced,
    Generated,
    Completed,
    Failed,
}

/// One progress notification from a running generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationProgress {
    pub step: CreationStep,
    pub creation: SubObject,
}

impl CreationProgress {
    pub fn is_final(&self) -> bool {
        matches!(self.step, CreationStep::Completed | CreationStep::Failed)
    }
}
