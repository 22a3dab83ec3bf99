//! Creation session repository trait definition.

use uuid::Uuid;

use avazon_types::avatar::Avatar;
use avazon_types::chat::CreationChat;
use avazon_types::creation::{
    AvatarCreation, CharacterCreation, ImageCreation, ObjectType, VoiceCreation,
};
use avazon_types::error::RepositoryError;

/// Repository trait for creation sessions, their attempts, and chat turns.
///
/// Implementations live in avazon-infra (e.g., SqliteCreationRepository).
pub trait CreationRepository: Send + Sync {
    // --- Sessions ---

    fn create_creation(
        &self,
        creation: &AvatarCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_creation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AvatarCreation>, RepositoryError>> + Send;

    /// Sessions of a user that are still `ready` or `processing`.
    fn list_active_creations(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<AvatarCreation>, RepositoryError>> + Send;

    /// Persist status, failure reason, and timestamps of a session.
    fn update_creation(
        &self,
        creation: &AvatarCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // --- Attempts ---

    fn insert_image(
        &self,
        image: &ImageCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn update_image(
        &self,
        image: &ImageCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Image attempts ordered by attempt number.
    fn list_images(
        &self,
        creation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ImageCreation>, RepositoryError>> + Send;

    fn insert_character(
        &self,
        character: &CharacterCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn update_character(
        &self,
        character: &CharacterCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn list_characters(
        &self,
        creation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<CharacterCreation>, RepositoryError>> + Send;

    fn insert_voice(
        &self,
        voice: &VoiceCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn update_voice(
        &self,
        voice: &VoiceCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn list_voices(
        &self,
        creation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<VoiceCreation>, RepositoryError>> + Send;

    // --- Chats ---

    fn save_chat(
        &self,
        chat: &CreationChat,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Chat turns in insertion order, optionally restricted to one object type.
    fn list_chats(
        &self,
        creation_id: &Uuid,
        object_type: Option<ObjectType>,
    ) -> impl std::future::Future<Output = Result<Vec<CreationChat>, RepositoryError>> + Send;

    // --- Publishing ---

    /// Insert `avatar` and mark the session completed in one transaction.
    ///
    /// Inside the transaction the session must be ready, processing or
    /// completed, must not have published an avatar yet, and each object's
    /// latest attempt must still be the completed row named in `attempts`.
    /// Any mismatch, or a taken avatar id, returns `Conflict` and writes
    /// nothing.
    fn publish_avatar(
        &self,
        creation_id: &Uuid,
        attempts: &PublishedAttempts,
        avatar: &Avatar,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// The attempt rows an avatar is published from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedAttempts {
    pub image: Uuid,
    pub character: Uuid,
    pub voice: Uuid,
}
