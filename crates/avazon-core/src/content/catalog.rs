//! Public catalogue of published avatars and their content.

use std::sync::Arc;

use serde::Serialize;

use avazon_types::avatar::{Avatar, AvatarMusic, AvatarVideo, ContentKind, PageRequest};
use avazon_types::error::ContentError;

use crate::repository::avatar::AvatarRepository;

use super::avatar_filter;

/// A published music track or video, serialized as the record itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublishedContent {
    Music(AvatarMusic),
    Video(AvatarVideo),
}

impl PublishedContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            PublishedContent::Music(_) => ContentKind::Music,
            PublishedContent::Video(_) => ContentKind::Video,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PublishedContent::Music(m) => &m.id,
            PublishedContent::Video(v) => &v.id,
        }
    }
}

pub struct CatalogService<A> {
    avatars: Arc<A>,
}

impl<A> Clone for CatalogService<A> {
    fn clone(&self) -> Self {
        Self {
            avatars: Arc::clone(&self.avatars),
        }
    }
}

impl<A: AvatarRepository> CatalogService<A> {
    pub fn new(avatars: Arc<A>) -> Self {
        Self { avatars }
    }

    pub async fn list_avatars(&self, page: PageRequest) -> Result<Vec<Avatar>, ContentError> {
        Ok(self.avatars.list_avatars(page).await?)
    }

    pub async fn get_avatar(&self, id: &str) -> Result<Avatar, ContentError> {
        self.avatars
            .get_avatar(id)
            .await?
            .ok_or(ContentError::AvatarNotFound)
    }

    pub async fn list_contents(
        &self,
        kind: ContentKind,
        avatar_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<PublishedContent>, ContentError> {
        let avatar_id = avatar_filter(avatar_id);
        let contents = match kind {
            ContentKind::Music => self
                .avatars
                .list_musics(avatar_id, page)
                .await?
                .into_iter()
                .map(PublishedContent::Music)
                .collect(),
            ContentKind::Video => self
                .avatars
                .list_videos(avatar_id, page)
                .await?
                .into_iter()
                .map(PublishedContent::Video)
                .collect(),
        };
        Ok(contents)
    }

    pub async fn get_content(&self, kind: ContentKind, id: &str) -> Result<PublishedContent, ContentError> {
        let content = match kind {
            ContentKind::Music => self.avatars.get_music(id).await?.map(PublishedContent::Music),
            ContentKind::Video => self.avatars.get_video(id).await?.map(PublishedContent::Video),
        };
        content.ok_or(ContentError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::testing::{MemoryStore, sample_avatar};

    fn music(id: &str, avatar_id: &str) -> AvatarMusic {
        AvatarMusic {
            id: id.to_string(),
            title: "Song".to_string(),
            avatar_id: avatar_id.to_string(),
            album_image_url: "mem://blobs/album.png".to_string(),
            music_url: "mem://blobs/music.mp3".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog() -> (MemoryStore, CatalogService<MemoryStore>) {
        let store = MemoryStore::new();
        store.insert_avatar(sample_avatar("a1", "u1"));
        store.insert_avatar(sample_avatar("a2", "u2"));
        store.insert_music(music("m1", "a1"));
        store.insert_music(music("m2", "a2"));
        store.insert_music(music("m3", "a1"));
        (store.clone(), CatalogService::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn avatars_are_public_and_newest_first() {
        let (_, catalog) = catalog();
        let avatars = catalog.list_avatars(PageRequest::default()).await.unwrap();
        assert_eq!(avatars.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), ["a2", "a1"]);
        assert_eq!(catalog.get_avatar("a1").await.unwrap().user_id, "u1");
        assert!(matches!(catalog.get_avatar("zz").await, Err(ContentError::AvatarNotFound)));
    }

    #[tokio::test]
    async fn contents_filter_by_avatar_and_page() {
        let (_, catalog) = catalog();

        let all = catalog
            .list_contents(ContentKind::Music, None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.iter().map(PublishedContent::id).collect::<Vec<_>>(), ["m3", "m2", "m1"]);

        let mine = catalog
            .list_contents(ContentKind::Music, Some("a1"), PageRequest::new(1, 1))
            .await
            .unwrap();
        assert_eq!(mine.iter().map(PublishedContent::id).collect::<Vec<_>>(), ["m1"]);

        let videos = catalog
            .list_contents(ContentKind::Video, None, PageRequest::default())
            .await
            .unwrap();
        assert!(videos.is_empty());
    }

    #[tokio::test]
    async fn content_lookup_by_kind() {
        let (_, catalog) = catalog();
        let found = catalog.get_content(ContentKind::Music, "m2").await.unwrap();
        assert_eq!(found.kind(), ContentKind::Music);
        assert!(matches!(
            catalog.get_content(ContentKind::Video, "m2").await,
            Err(ContentError::NotFound)
        ));

        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["id"], "m2");
        assert_eq!(json["music_url"], "mem://blobs/music.mp3");
    }
}
