//! Avatar remix repository trait definition.

use uuid::Uuid;

use avazon_types::avatar::{Avatar, PageRequest};
use avazon_types::error::RepositoryError;
use avazon_types::remix::AvatarRemix;
use avazon_types::status::RemixStatus;

/// Repository trait for avatar image remixes.
///
/// Same compare-and-set contract as [`super::content::ContentRepository`].
pub trait RemixRepository: Send + Sync {
    fn create_remix(
        &self,
        remix: &AvatarRemix,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_remix(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AvatarRemix>, RepositoryError>> + Send;

    fn list_remixes(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Vec<AvatarRemix>, RepositoryError>> + Send;

    fn update_remix(
        &self,
        remix: &AvatarRemix,
        expected: RemixStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert the derived `avatar` and mark the remix confirmed in one transaction.
    fn publish_remix(
        &self,
        remix: &AvatarRemix,
        expected: RemixStatus,
        avatar: &Avatar,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
