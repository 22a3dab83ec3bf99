//! Music and video creation repository trait definition.

use uuid::Uuid;

use avazon_types::avatar::{AvatarMusic, AvatarVideo, PageRequest};
use avazon_types::content::{MusicCreation, VideoCreation};
use avazon_types::error::RepositoryError;
use avazon_types::status::ContentStatus;

/// Repository trait for in-progress music and video creations.
///
/// Updates are compare-and-set on status: `expected` is the status the
/// caller last observed. If the stored row has moved on, the update writes
/// nothing and returns `Conflict`.
pub trait ContentRepository: Send + Sync {
    // --- Music ---

    fn create_music(
        &self,
        music: &MusicCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_music_creation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<MusicCreation>, RepositoryError>> + Send;

    /// A user's music creations, newest first. An empty `avatar_id`
    /// matches every avatar.
    fn list_music_creations(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<MusicCreation>, RepositoryError>> + Send;

    fn update_music(
        &self,
        music: &MusicCreation,
        expected: ContentStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert `published` and mark the creation confirmed in one transaction.
    fn publish_music(
        &self,
        music: &MusicCreation,
        expected: ContentStatus,
        published: &AvatarMusic,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // --- Video ---

    fn create_video(
        &self,
        video: &VideoCreation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_video_creation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<VideoCreation>, RepositoryError>> + Send;

    fn list_video_creations(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<VideoCreation>, RepositoryError>> + Send;

    fn update_video(
        &self,
        video: &VideoCreation,
        expected: ContentStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn publish_video(
        &self,
        video: &VideoCreation,
        expected: ContentStatus,
        published: &AvatarVideo,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
