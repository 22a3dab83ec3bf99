//! Avatar remix: restyle the profile image, then publish it as a new avatar.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use avazon_types::avatar::{Avatar, PageRequest};
use avazon_types::error::{ContentError, RepositoryError, ValidationError};
use avazon_types::remix::{AvatarRemix, RemixRequest};
use avazon_types::status::{Lifecycle, RemixStatus};

use crate::generation::Generators;
use crate::repository::avatar::AvatarRepository;
use crate::repository::remix::RemixRepository;

use super::{StepError, avatar_filter, failure_reason};

pub struct RemixService<R, A> {
    remixes: Arc<R>,
    avatars: Arc<A>,
    generators: Generators,
}

impl<R, A> Clone for RemixService<R, A> {
    fn clone(&self) -> Self {
        Self {
            remixes: Arc::clone(&self.remixes),
            avatars: Arc::clone(&self.avatars),
            generators: self.generators.clone(),
        }
    }
}

impl<R, A> RemixService<R, A>
where
    R: RemixRepository + 'static,
    A: AvatarRepository + 'static,
{
    pub fn new(remixes: Arc<R>, avatars: Arc<A>, generators: Generators) -> Self {
        Self {
            remixes,
            avatars,
            generators,
        }
    }

    pub async fn start(
        &self,
        user_id: &str,
        avatar_id: &str,
        request: RemixRequest,
    ) -> Result<AvatarRemix, ContentError> {
        let avatar = self
            .avatars
            .get_avatar(avatar_id)
            .await?
            .ok_or(ContentError::AvatarNotFound)?;

        let remix = AvatarRemix::new(user_id, avatar_id, request);
        self.remixes.create_remix(&remix).await?;
        info!(remix_id = %remix.id, avatar_id, "remix started");

        let span = info_span!("remix", remix_id = %remix.id, avatar_id);
        let service = self.clone();
        let row = remix.clone();
        tokio::spawn(
            async move {
                let mut row = row;
                if let Err(e) = service.restyle(&mut row, &avatar).await {
                    service.fail(&mut row, &e).await;
                }
            }
            .instrument(span),
        );
        Ok(remix)
    }

    /// Publish the remix as avatar `new_avatar_id`, copied from the
    /// original with the restyled profile image.
    pub async fn confirm(&self, user_id: &str, id: &Uuid, new_avatar_id: &str) -> Result<Avatar, ContentError> {
        let new_avatar_id = new_avatar_id.trim();
        if new_avatar_id.is_empty() {
            return Err(ValidationError::new("avatar_id", "must not be empty").into());
        }
        let remix = self.get(user_id, id).await?;
        match remix.status {
            RemixStatus::Confirmed => return Err(ContentError::AlreadyConfirmed),
            RemixStatus::Yet | RemixStatus::Progressing => return Err(ContentError::StillProcessing),
            RemixStatus::Failed => return Err(ContentError::ContentNotCompleted),
            RemixStatus::Completed => {}
        }
        let Some(image_url) = remix.image_url.clone() else {
            return Err(ContentError::ContentNotCompleted);
        };
        let original = self
            .avatars
            .get_avatar(&remix.avatar_id)
            .await?
            .ok_or(ContentError::AvatarNotFound)?;

        let avatar = Avatar {
            id: new_avatar_id.to_string(),
            user_id: user_id.to_string(),
            remix_avatar_id: Some(original.id.clone()),
            profile_image_url: image_url,
            created_at: Utc::now(),
            ..original
        };
        let mut confirmed = remix.clone();
        confirmed.status = remix.status.transition(RemixStatus::Confirmed)?;
        confirmed.updated_at = Utc::now();

        match self.remixes.publish_remix(&confirmed, remix.status, &avatar).await {
            Ok(()) => {
                info!(remix_id = %id, avatar_id = new_avatar_id, "remix published as avatar");
                Ok(avatar)
            }
            Err(RepositoryError::Conflict(message)) => match self.remixes.get_remix(id).await? {
                Some(current) if current.status == RemixStatus::Confirmed => Err(ContentError::AlreadyConfirmed),
                _ => Err(ContentError::Conflict(message)),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user_id: &str, id: &Uuid) -> Result<AvatarRemix, ContentError> {
        self.remixes
            .get_remix(id)
            .await?
            .filter(|remix| remix.user_id == user_id)
            .ok_or(ContentError::NotFound)
    }

    pub async fn list(
        &self,
        user_id: &str,
        avatar_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<AvatarRemix>, ContentError> {
        Ok(self
            .remixes
            .list_remixes(user_id, avatar_filter(avatar_id), page)
            .await?)
    }

    async fn restyle(&self, remix: &mut AvatarRemix, avatar: &Avatar) -> Result<(), StepError> {
        self.advance(remix, RemixStatus::Progressing).await?;
        let source = self.generators.blobs.download(&avatar.profile_image_url).await?;
        let styled = self.generators.painter.change_style(&source, &remix.prompt).await?;
        let url = self
            .generators
            .blobs
            .upload_media(&format!("remix{}", remix.id), styled)
            .await?;
        remix.image_url = Some(url);
        self.advance(remix, RemixStatus::Completed).await?;
        info!("remix ready");
        Ok(())
    }

    async fn advance(&self, remix: &mut AvatarRemix, next: RemixStatus) -> Result<(), StepError> {
        let mut updated = remix.clone();
        updated.status = remix.status.transition(next)?;
        updated.updated_at = Utc::now();
        self.remixes.update_remix(&updated, remix.status).await?;
        *remix = updated;
        Ok(())
    }

    async fn fail(&self, remix: &mut AvatarRemix, err: &StepError) {
        let reason = failure_reason(err);
        warn!(status = %remix.status, error = %reason, "remix failed");
        if !remix.status.can_transition_to(RemixStatus::Failed) {
            return;
        }
        remix.failed_reason = Some(reason);
        if let Err(e) = self.advance(remix, RemixStatus::Failed).await {
            warn!(error = %e, "could not record remix failure");
        }
    }
}
