//! Video pipeline.
//!
//! Two requests: `start_image` paints a thumbnail of the avatar from its
//! profile image, then `create_video` animates the thumbnail.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use avazon_types::avatar::{Avatar, AvatarVideo, PageRequest};
use avazon_types::content::{VideoCreation, VideoImageRequest, VideoRequest};
use avazon_types::error::{ContentError, RepositoryError, ValidationError};
use avazon_types::prompt::Agent;
use avazon_types::status::{ContentStatus, Lifecycle};

use crate::generation::painter::THUMBNAIL_SIZE;
use crate::generation::{Generators, PaintRequest};
use crate::prompt::BoxPromptRegistry;
use crate::repository::avatar::AvatarRepository;
use crate::repository::content::ContentRepository;

use super::{StepError, avatar_filter, failure_reason};

pub struct VideoService<C, A> {
    content: Arc<C>,
    avatars: Arc<A>,
    prompts: Arc<BoxPromptRegistry>,
    generators: Generators,
}

impl<C, A> Clone for VideoService<C, A> {
    fn clone(&self) -> Self {
        Self {
            content: Arc::clone(&self.content),
            avatars: Arc::clone(&self.avatars),
            prompts: Arc::clone(&self.prompts),
            generators: self.generators.clone(),
        }
    }
}

impl<C, A> VideoService<C, A>
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

    /// Record the request and paint the thumbnail in the background.
    pub async fn start_image(
        &self,
        user_id: &str,
        avatar_id: &str,
        request: VideoImageRequest,
    ) -> Result<VideoCreation, ContentError> {
        request.validate()?;
        let avatar = self
            .avatars
            .get_avatar(avatar_id)
            .await?
            .ok_or(ContentError::AvatarNotFound)?;

        let video = VideoCreation::new(user_id, avatar_id, request);
        self.content.create_video(&video).await?;
        info!(video_id = %video.id, avatar_id, "video creation started");

        let span = info_span!("video_thumbnail", video_id = %video.id, avatar_id);
        let service = self.clone();
        let row = video.clone();
        tokio::spawn(
            async move {
                let mut row = row;
                if let Err(e) = service.paint_thumbnail(&mut row, &avatar).await {
                    service.fail(&mut row, &e).await;
                }
            }
            .instrument(span),
        );
        Ok(video)
    }

    /// Animate the finished thumbnail. Requires `image_completed`.
    pub async fn create_video(
        &self,
        user_id: &str,
        id: &Uuid,
        request: VideoRequest,
    ) -> Result<VideoCreation, ContentError> {
        request.validate()?;
        let video = self.get(user_id, id).await?;
        match video.status {
            ContentStatus::Yet => return Err(ContentError::NotStarted),
            s if s.is_in_flight() => return Err(ContentError::StillProcessing),
            ContentStatus::ContentCompleted => return Err(ContentError::ContentAlreadyCreated),
            ContentStatus::Confirmed => return Err(ContentError::AlreadyConfirmed),
            ContentStatus::Failed => return Err(ContentError::Failed),
            _ => {}
        }
        let Some(thumbnail_url) = video.thumbnail_image_url.clone() else {
            return Err(ContentError::NotStarted);
        };

        let mut started = video.clone();
        started.status = video.status.transition(ContentStatus::ContentProgressing)?;
        started.title = Some(request.title.trim().to_string());
        started.video_prompt = Some(request.prompt.clone());
        started.updated_at = Utc::now();
        self.content.update_video(&started, video.status).await?;
        info!(video_id = %id, "video step started");

        let span = info_span!("video_render", video_id = %id);
        let service = self.clone();
        let row = started.clone();
        tokio::spawn(
            async move {
                let mut row = row;
                if let Err(e) = service.render(&mut row, &thumbnail_url, &request.prompt).await {
                    service.fail(&mut row, &e).await;
                }
            }
            .instrument(span),
        );
        Ok(started)
    }

    /// Publish the finished video as `content_id` and mark the row confirmed.
    pub async fn confirm(&self, user_id: &str, id: &Uuid, content_id: &str) -> Result<AvatarVideo, ContentError> {
        let content_id = content_id.trim();
        if content_id.is_empty() {
            return Err(ValidationError::new("content_id", "must not be empty").into());
        }
        let video = self.get(user_id, id).await?;
        match video.status {
            ContentStatus::Confirmed => return Err(ContentError::AlreadyConfirmed),
            ContentStatus::ContentCompleted => {}
            _ => return Err(ContentError::ContentNotCompleted),
        }
        let (Some(thumbnail_url), Some(video_url)) =
            (video.thumbnail_image_url.clone(), video.video_content_url.clone())
        else {
            return Err(ContentError::ContentNotCompleted);
        };

        let now = Utc::now();
        let published = AvatarVideo {
            id: content_id.to_string(),
            title: video.title.clone().unwrap_or_default(),
            avatar_id: video.avatar_id.clone(),
            thumbnail_url,
            video_url,
            created_at: now,
            updated_at: now,
        };
        let mut confirmed = video.clone();
        confirmed.status = video.status.transition(ContentStatus::Confirmed)?;
        confirmed.updated_at = now;

        match self.content.publish_video(&confirmed, video.status, &published).await {
            Ok(()) => {
                info!(video_id = %id, content_id, "video published");
                Ok(published)
            }
            Err(RepositoryError::Conflict(message)) => match self.content.get_video_creation(id).await? {
                Some(current) if current.status == ContentStatus::Confirmed => Err(ContentError::AlreadyConfirmed),
                _ => Err(ContentError::Conflict(message)),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user_id: &str, id: &Uuid) -> Result<VideoCreation, ContentError> {
        self.content
            .get_video_creation(id)
            .await?
            .filter(|video| video.user_id == user_id)
            .ok_or(ContentError::NotFound)
    }

    pub async fn list(
        &self,
        user_id: &str,
        avatar_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<VideoCreation>, ContentError> {
        Ok(self
            .content
            .list_video_creations(user_id, avatar_filter(avatar_id), page)
            .await?)
    }

    async fn paint_thumbnail(&self, video: &mut VideoCreation, avatar: &Avatar) -> Result<(), StepError> {
        self.advance(video, ContentStatus::ImageProgressing).await?;

        let brief = format!(
            "Character: {}, a {} {}. {}\nScene: {}",
            avatar.name, avatar.gender, avatar.species, avatar.character_description, video.image_prompt
        );
        let prompt = self.prompts.use_prompt(Agent::VideoPrompt, &brief).await?;
        let reference = self.generators.blobs.download(&avatar.profile_image_url).await?;
        let request = PaintRequest::portrait(prompt.as_str())
            .with_size(THUMBNAIL_SIZE)
            .with_reference(reference);
        let image = self.generators.painter.paint(&request).await?;
        let url = self
            .generators
            .blobs
            .upload_media(&format!("thumbnail{}", video.id), image)
            .await?;

        video.generated_image_prompt = Some(prompt);
        video.thumbnail_image_url = Some(url);
        self.advance(video, ContentStatus::ImageCompleted).await?;
        info!("video thumbnail ready");
        Ok(())
    }

    async fn render(&self, video: &mut VideoCreation, thumbnail_url: &str, prompt: &str) -> Result<(), StepError> {
        let clip = self.generators.video.create_video(thumbnail_url, prompt).await?;
        let url = self
            .generators
            .blobs
            .upload_media(&format!("video{}", video.id), clip)
            .await?;
        video.video_content_url = Some(url);
        self.advance(video, ContentStatus::ContentCompleted).await?;
        info!("video ready");
        Ok(())
    }

    /// Validate `next` against the table and compare-and-set the row.
    async fn advance(&self, video: &mut VideoCreation, next: ContentStatus) -> Result<(), StepError> {
        let mut updated = video.clone();
        updated.status = video.status.transition(next)?;
        updated.updated_at = Utc::now();
        self.content.update_video(&updated, video.status).await?;
        *video = updated;
        Ok(())
    }

    async fn fail(&self, video: &mut VideoCreation, err: &StepError) {
        let reason = failure_reason(err);
        warn!(status = %video.status, error = %reason, "video step failed");
        if !video.status.can_transition_to(ContentStatus::Failed) {
            return;
        }
        video.failed_reason = Some(reason);
        if let Err(e) = self.advance(video, ContentStatus::Failed).await {
            warn!(error = %e, "could not record video failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GeneratedMedia;
    use crate::testing::{Fakes, MemoryStore, ScriptedLlm, Switch, eventually, prompt_registry, sample_avatar};

    fn service(store: &MemoryStore, fakes: &Fakes) -> VideoService<MemoryStore, MemoryStore> {
        let avatar = sample_avatar("a1", "owner");
        fakes.blobs.put(
            &avatar.profile_image_url,
            GeneratedMedia::new(b"face".to_vec(), "image/png"),
        );
        store.insert_avatar(avatar);
        VideoService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            prompt_registry(store, ScriptedLlm::new()),
            fakes.generators(),
        )
    }

    async fn settled(
        service: &VideoService<MemoryStore, MemoryStore>,
        id: &Uuid,
        status: ContentStatus,
    ) -> VideoCreation {
        assert!(
            eventually(|| async { service.get("u1", id).await.unwrap().status == status }).await,
            "video never reached {status}"
        );
        service.get("u1", id).await.unwrap()
    }

    fn beach() -> VideoImageRequest {
        VideoImageRequest {
            prompt: "dancing on the beach".to_string(),
        }
    }

    fn clip() -> VideoRequest {
        VideoRequest {
            title: "Beach day".to_string(),
            prompt: "waves and a slow turn".to_string(),
        }
    }

    #[tokio::test]
    async fn thumbnail_then_video_then_confirm() {
        let store = MemoryStore::new();
        let fakes = Fakes::default();
        let service = service(&store, &fakes);

        let started = service.start_image("u1", "a1", beach()).await.unwrap();
        assert_eq!(started.status, ContentStatus::Yet);
        let thumbnail = settled(&service, &started.id, ContentStatus::ImageCompleted).await;
        assert!(thumbnail.generated_image_prompt.as_deref().unwrap().contains("dancing on the beach"));

        let painted = fakes.painter.requests.lock().unwrap().clone();
        assert_eq!((painted[0].width, painted[0].height), THUMBNAIL_SIZE);
        assert_eq!(painted[0].reference.as_ref().unwrap().bytes, b"face".to_vec());

        let err = service.confirm("u1", &started.id, "v1").await.unwrap_err();
        assert!(matches!(err, ContentError::ContentNotCompleted));

        let rendering = service.create_video("u1", &started.id, clip()).await.unwrap();
        assert_eq!(rendering.status, ContentStatus::ContentProgressing);
        let done = settled(&service, &started.id, ContentStatus::ContentCompleted).await;
        assert_eq!(done.title.as_deref(), Some("Beach day"));
        assert_eq!(
            done.video_content_url.as_deref(),
            Some(format!("mem://blobs/video{}.mp4", done.id).as_str())
        );

        let err = service.create_video("u1", &started.id, clip()).await.unwrap_err();
        assert!(matches!(err, ContentError::ContentAlreadyCreated));

        let published = service.confirm("u1", &started.id, "v1").await.unwrap();
        assert_eq!(published.title, "Beach day");
        assert_eq!(published.thumbnail_url, done.thumbnail_image_url.unwrap());
        let err = service.confirm("u1", &started.id, "v2").await.unwrap_err();
        assert!(matches!(err, ContentError::AlreadyConfirmed));
        let err = service.create_video("u1", &started.id, clip()).await.unwrap_err();
        assert!(matches!(err, ContentError::AlreadyConfirmed));
    }

    #[tokio::test]
    async fn video_before_thumbnail_is_rejected() {
        let store = MemoryStore::new();
        let (switch, gate) = Switch::gated();
        let mut fakes = Fakes::default();
        fakes.painter.switch = switch;
        let service = service(&store, &fakes);

        let started = service.start_image("u1", "a1", beach()).await.unwrap();
        settled(&service, &started.id, ContentStatus::ImageProgressing).await;
        let err = service.create_video("u1", &started.id, clip()).await.unwrap_err();
        assert!(matches!(err, ContentError::StillProcessing));

        gate.add_permits(1);
        settled(&service, &started.id, ContentStatus::ImageCompleted).await;
    }

    #[tokio::test]
    async fn missing_profile_image_fails_the_thumbnail() {
        let store = MemoryStore::new();
        let fakes = Fakes::default();
        let service = service(&store, &fakes);
        let mut avatar = sample_avatar("a2", "owner");
        avatar.profile_image_url = "mem://blobs/nowhere.png".to_string();
        store.insert_avatar(avatar);

        let started = service.start_image("u1", "a2", beach()).await.unwrap();
        let failed = settled(&service, &started.id, ContentStatus::Failed).await;
        assert!(failed.failed_reason.unwrap().contains("404"));

        let err = service.create_video("u1", &started.id, clip()).await.unwrap_err();
        assert!(matches!(err, ContentError::Failed));
    }

    #[tokio::test]
    async fn producer_failure_is_recorded() {
        let store = MemoryStore::new();
        let fakes = Fakes::default();
        fakes.video.switch.set_failing(true);
        let service = service(&store, &fakes);

        let started = service.start_image("u1", "a1", beach()).await.unwrap();
        settled(&service, &started.id, ContentStatus::ImageCompleted).await;
        service.create_video("u1", &started.id, clip()).await.unwrap();

        let failed = settled(&service, &started.id, ContentStatus::Failed).await;
        assert_eq!(failed.failed_reason.as_deref(), Some("generation failed: video unavailable"));
        assert!(failed.video_content_url.is_none());

        let err = service.create_video("u1", &started.id, clip()).await.unwrap_err();
        assert!(matches!(err, ContentError::Failed));
        assert_eq!(fakes.video.switch.calls(), 1);
    }
}
