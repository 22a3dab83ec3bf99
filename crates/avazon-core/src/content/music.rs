//! Music pipeline: album image, then track, chained in the background.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use avazon_types::avatar::{Avatar, AvatarMusic, PageRequest};
use avazon_types::content::{MusicCreation, MusicRequest};
use avazon_types::error::{ContentError, RepositoryError, ValidationError};
use avazon_types::prompt::Agent;
use avazon_types::status::{ContentStatus, Lifecycle};

use crate::generation::{Generators, MusicPrompt, PaintRequest};
use crate::prompt::BoxPromptRegistry;
use crate::repository::avatar::AvatarRepository;
use crate::repository::content::ContentRepository;

use super::{StepError, avatar_filter, failure_reason};

pub struct MusicService<C, A> {
    content: Arc<C>,
    avatars: Arc<A>,
    prompts: Arc<BoxPromptRegistry>,
    generators: Generators,
}

impl<C, A> Clone for MusicService<C, A> {
    fn clone(&self) -> Self {
        Self {
            content: Arc::clone(&self.content),
            avatars: Arc::clone(&self.avatars),
            prompts: Arc::clone(&self.prompts),
            generators: self.generators.clone(),
        }
    }
}

impl<C, A> MusicService<C, A>
where
    C: ContentRepository + 'static,
    A: AvatarRepository + 'static,
{
    pub fn new(
        content: Arc<C>,
        avatars: Arc<A>,
        prompts: Arc<BoxPromptRegistry>,
        generators: Generators,
    ) -> Self {
        Self {
            content,
            avatars,
            prompts,
            generators,
        }
    }

    /// Record the request and run both steps in the background.
    pub async fn start(
        &self,
        user_id: &str,
        avatar_id: &str,
        request: MusicRequest,
    ) -> Result<MusicCreation, ContentError> {
        request.validate()?;
        let avatar = self
            .avatars
            .get_avatar(avatar_id)
            .await?
            .ok_or(ContentError::AvatarNotFound)?;

        let music = MusicCreation::new(user_id, avatar_id, request);
        self.content.create_music(&music).await?;
        info!(music_id = %music.id, avatar_id, "music creation started");

        self.spawn(music.clone(), avatar, true);
        Ok(music)
    }

    /// Paint a new album image. The track, if any, is kept.
    pub async fn regenerate_image(&self, user_id: &str, id: &Uuid) -> Result<MusicCreation, ContentError> {
        let music = self.get(user_id, id).await?;
        match music.status {
            s if s.is_in_flight() => return Err(ContentError::StillProcessing),
            ContentStatus::Confirmed => return Err(ContentError::AlreadyConfirmed),
            s if !s.can_regenerate_image() => return Err(ContentError::NotStarted),
            _ => {}
        }
        let avatar = self
            .avatars
            .get_avatar(&music.avatar_id)
            .await?
            .ok_or(ContentError::AvatarNotFound)?;

        let mut restarted = music.clone();
        restarted.status = ContentStatus::ImageProgressing;
        restarted.album_image_url = None;
        restarted.failed_reason = None;
        restarted.updated_at = Utc::now();
        self.content.update_music(&restarted, music.status).await?;
        info!(music_id = %id, previous = %music.status, "regenerating album image");

        self.spawn(restarted.clone(), avatar, false);
        Ok(restarted)
    }

    /// Publish the finished track as `content_id` and mark the row confirmed.
    pub async fn confirm(&self, user_id: &str, id: &Uuid, content_id: &str) -> Result<AvatarMusic, ContentError> {
        let content_id = content_id.trim();
        if content_id.is_empty() {
            return Err(ValidationError::new("content_id", "must not be empty").into());
        }
        let music = self.get(user_id, id).await?;
        match music.status {
            ContentStatus::Confirmed => return Err(ContentError::AlreadyConfirmed),
            ContentStatus::ContentCompleted => {}
            _ => return Err(ContentError::ContentNotCompleted),
        }
        let (Some(album_image_url), Some(music_url)) = (music.album_image_url.clone(), music.music_url.clone())
        else {
            return Err(ContentError::ContentNotCompleted);
        };

        let now = Utc::now();
        let published = AvatarMusic {
            id: content_id.to_string(),
            title: music.title.clone(),
            avatar_id: music.avatar_id.clone(),
            album_image_url,
            music_url,
            created_at: now,
            updated_at: now,
        };
        let mut confirmed = music.clone();
        confirmed.status = music.status.transition(ContentStatus::Confirmed)?;
        confirmed.updated_at = now;

        match self.content.publish_music(&confirmed, music.status, &published).await {
            Ok(()) => {
                info!(music_id = %id, content_id, "music published");
                Ok(published)
            }
            Err(RepositoryError::Conflict(message)) => match self.content.get_music_creation(id).await? {
                Some(current) if current.status == ContentStatus::Confirmed => Err(ContentError::AlreadyConfirmed),
                _ => Err(ContentError::Conflict(message)),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// The caller's music creation; other users' rows are not found.
    pub async fn get(&self, user_id: &str, id: &Uuid) -> Result<MusicCreation, ContentError> {
        self.content
            .get_music_creation(id)
            .await?
            .filter(|music| music.user_id == user_id)
            .ok_or(ContentError::NotFound)
    }

    pub async fn list(
        &self,
        user_id: &str,
        avatar_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<MusicCreation>, ContentError> {
        Ok(self
            .content
            .list_music_creations(user_id, avatar_filter(avatar_id), page)
            .await?)
    }

    fn spawn(&self, music: MusicCreation, avatar: Avatar, with_track: bool) {
        let span = info_span!("music_pipeline", music_id = %music.id, avatar_id = %music.avatar_id);
        let service = self.clone();
        tokio::spawn(async move { service.run(music, avatar, with_track).await }.instrument(span));
    }

    async fn run(&self, mut music: MusicCreation, avatar: Avatar, with_track: bool) {
        match self.steps(&mut music, &avatar, with_track).await {
            Ok(()) => info!(status = %music.status, "music pipeline finished"),
            Err(e) => self.fail(&mut music, &e).await,
        }
    }

    async fn steps(&self, music: &mut MusicCreation, avatar: &Avatar, with_track: bool) -> Result<(), StepError> {
        if with_track {
            self.advance(music, ContentStatus::ImageProgressing).await?;
        }
        self.paint_album(music, avatar).await?;

        if !with_track {
            let settled = ContentStatus::after_image_regenerated(music.music_url.is_some());
            return self.save(music, settled).await;
        }
        self.advance(music, ContentStatus::ImageCompleted).await?;
        self.advance(music, ContentStatus::ContentProgressing).await?;
        self.produce_track(music).await?;
        self.advance(music, ContentStatus::ContentCompleted).await
    }

    async fn paint_album(&self, music: &mut MusicCreation, avatar: &Avatar) -> Result<(), StepError> {
        let brief = format!(
            "{}\nArtist: {}, a {} {}. {}",
            music.request().info(),
            avatar.name,
            avatar.gender,
            avatar.species,
            avatar.character_description
        );
        let prompt = self.prompts.use_prompt(Agent::MusicImagePrompt, &brief).await?;
        let image = self.generators.painter.paint(&PaintRequest::portrait(prompt.as_str())).await?;
        let url = self
            .generators
            .blobs
            .upload_media(&format!("album{}", music.id), image)
            .await?;
        music.generated_image_prompt = Some(prompt);
        music.album_image_url = Some(url);
        Ok(())
    }

    async fn produce_track(&self, music: &mut MusicCreation) -> Result<(), StepError> {
        let description = self
            .prompts
            .use_prompt(Agent::MusicCreate, &music.request().info())
            .await?;
        let track = self
            .generators
            .music
            .produce(&MusicPrompt {
                title: music.title.clone(),
                style: music.style.clone(),
                description: description.clone(),
                duration_secs: music.duration,
            })
            .await?;
        let url = self
            .generators
            .blobs
            .upload_public(&format!("music{}.mp3", music.id), track.bytes, &track.mime_type)
            .await?;
        music.generated_music_prompt = Some(description);
        music.music_url = Some(url);
        Ok(())
    }

    async fn advance(&self, music: &mut MusicCreation, next: ContentStatus) -> Result<(), StepError> {
        music.status.transition(next)?;
        self.save(music, next).await
    }

    /// Compare-and-set `music` with status `next`.
    async fn save(&self, music: &mut MusicCreation, next: ContentStatus) -> Result<(), StepError> {
        let mut updated = music.clone();
        updated.status = next;
        updated.updated_at = Utc::now();
        self.content.update_music(&updated, music.status).await?;
        *music = updated;
        Ok(())
    }

    async fn fail(&self, music: &mut MusicCreation, err: &StepError) {
        let reason = failure_reason(err);
        warn!(status = %music.status, error = %reason, "music step failed");
        if !music.status.can_transition_to(ContentStatus::Failed) {
            return;
        }
        music.failed_reason = Some(reason);
        if let Err(e) = self.save(music, ContentStatus::Failed).await {
            warn!(error = %e, "could not record music failure");
        }
    }
}
