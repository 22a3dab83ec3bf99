//! Published avatar repository trait definition.

use avazon_types::avatar::{Avatar, AvatarMusic, AvatarVideo, PageRequest};
use avazon_types::error::RepositoryError;

/// Read access to published avatars and their published content.
///
/// Published records are written only by the publishing transactions of
/// the creation, content, and remix repositories.
pub trait AvatarRepository: Send + Sync {
    fn get_avatar(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Avatar>, RepositoryError>> + Send;

    /// Avatars newest first.
    fn list_avatars(
        &self,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<Avatar>, RepositoryError>> + Send;

    fn get_music(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<AvatarMusic>, RepositoryError>> + Send;

    /// Published music newest first; an empty `avatar_id` lists every avatar's.
    fn list_musics(
        &self,
        avatar_id: &str,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<AvatarMusic>, RepositoryError>> + Send;

    fn get_video(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<AvatarVideo>, RepositoryError>> + Send;

    /// Same filter rule as `list_musics`.
    fn list_videos(
        &self,
        avatar_id: &str,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<AvatarVideo>, RepositoryError>> + Send;
}
