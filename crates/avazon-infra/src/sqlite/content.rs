//! SQLite music and video creation repository.
//!
//! Every update is a compare-and-set on `status`: the row is written only if
//! its stored status still equals the status the caller last observed.

use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use avazon_core::repository::content::ContentRepository;
use avazon_types::avatar::{AvatarMusic, AvatarVideo, PageRequest};
use avazon_types::content::{MusicCreation, VideoCreation};
use avazon_types::error::RepositoryError;
use avazon_types::status::ContentStatus;

use super::avatar::{insert_music, insert_video};
use super::pool::DatabasePool;
use super::{
    column, datetime_column, enum_column, format_datetime, insert_err, page_bounds, query_err, uuid_column,
};

/// SQLite-backed implementation of `ContentRepository`.
pub struct SqliteContentRepository {
    pool: DatabasePool,
}

impl SqliteContentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_music(row: &SqliteRow) -> Result<MusicCreation, RepositoryError> {
    Ok(MusicCreation {
        id: uuid_column(row, "id")?,
        user_id: column(row, "user_id")?,
        avatar_id: column(row, "avatar_id")?,
        title: column(row, "title")?,
        duration: column(row, "duration")?,
        style: column(row, "style")?,
        description: column(row, "description")?,
        generated_image_prompt: column(row, "generated_image_prompt")?,
        generated_music_prompt: column(row, "generated_music_prompt")?,
        album_image_url: column(row, "album_image_url")?,
        music_url: column(row, "music_url")?,
        status: enum_column(row, "status")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn map_video(row: &SqliteRow) -> Result<VideoCreation, RepositoryError> {
    Ok(VideoCreation {
        id: uuid_column(row, "id")?,
        user_id: column(row, "user_id")?,
        avatar_id: column(row, "avatar_id")?,
        image_prompt: column(row, "image_prompt")?,
        generated_image_prompt: column(row, "generated_image_prompt")?,
        thumbnail_image_url: column(row, "thumbnail_image_url")?,
        title: column(row, "title")?,
        video_prompt: column(row, "video_prompt")?,
        video_content_url: column(row, "video_content_url")?,
        status: enum_column(row, "status")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Explain a compare-and-set miss: the row is gone or has moved on.
async fn cas_miss(conn: &mut SqliteConnection, table: &'static str, id: &Uuid) -> RepositoryError {
    let sql = format!("SELECT status FROM {table} WHERE id = ?");
    match sqlx::query_scalar::<_, String>(&sql)
        .bind(id.to_string())
        .fetch_optional(conn)
        .await
    {
        Ok(Some(status)) => RepositoryError::Conflict(format!("status is {status}")),
        Ok(None) => RepositoryError::NotFound,
        Err(e) => query_err(e),
    }
}

async fn write_music(
    conn: &mut SqliteConnection,
    music: &MusicCreation,
    expected: ContentStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE music_creations SET generated_image_prompt = ?, generated_music_prompt = ?, album_image_url = ?, music_url = ?, status = ?, failed_reason = ?, updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(&music.generated_image_prompt)
    .bind(&music.generated_music_prompt)
    .bind(&music.album_image_url)
    .bind(&music.music_url)
    .bind(music.status.to_string())
    .bind(&music.failed_reason)
    .bind(format_datetime(&music.updated_at))
    .bind(music.id.to_string())
    .bind(expected.to_string())
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;
    if result.rows_affected() == 0 {
        return Err(cas_miss(conn, "music_creations", &music.id).await);
    }
    Ok(())
}

async fn write_video(
    conn: &mut SqliteConnection,
    video: &VideoCreation,
    expected: ContentStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE video_creations SET generated_image_prompt = ?, thumbnail_image_url = ?, title = ?, video_prompt = ?, video_content_url = ?, status = ?, failed_reason = ?, updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(&video.generated_image_prompt)
    .bind(&video.thumbnail_image_url)
    .bind(&video.title)
    .bind(&video.video_prompt)
    .bind(&video.video_content_url)
    .bind(video.status.to_string())
    .bind(&video.failed_reason)
    .bind(format_datetime(&video.updated_at))
    .bind(video.id.to_string())
    .bind(expected.to_string())
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;
    if result.rows_affected() == 0 {
        return Err(cas_miss(conn, "video_creations", &video.id).await);
    }
    Ok(())
}

impl ContentRepository for SqliteContentRepository {
    async fn create_music(&self, music: &MusicCreation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO music_creations (id, user_id, avatar_id, title, duration, style, description, generated_image_prompt, generated_music_prompt, album_image_url, music_url, status, failed_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(music.id.to_string())
        .bind(&music.user_id)
        .bind(&music.avatar_id)
        .bind(&music.title)
        .bind(music.duration)
        .bind(&music.style)
        .bind(&music.description)
        .bind(&music.generated_image_prompt)
        .bind(&music.generated_music_prompt)
        .bind(&music.album_image_url)
        .bind(&music.music_url)
        .bind(music.status.to_string())
        .bind(&music.failed_reason)
        .bind(format_datetime(&music.created_at))
        .bind(format_datetime(&music.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("music creation '{}'", music.id)))?;
        Ok(())
    }

    async fn get_music_creation(&self, id: &Uuid) -> Result<Option<MusicCreation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM music_creations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_music).transpose()
    }

    async fn list_music_creations(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> Result<Vec<MusicCreation>, RepositoryError> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(
            "SELECT * FROM music_creations WHERE user_id = ? AND (? = '' OR avatar_id = ?)
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(avatar_id)
        .bind(avatar_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_music).collect()
    }

    async fn update_music(&self, music: &MusicCreation, expected: ContentStatus) -> Result<(), RepositoryError> {
        let mut conn = self.pool.writer.acquire().await.map_err(query_err)?;
        write_music(&mut conn, music, expected).await
    }

    async fn publish_music(
        &self,
        music: &MusicCreation,
        expected: ContentStatus,
        published: &AvatarMusic,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        write_music(&mut tx, music, expected).await?;
        insert_music(&mut tx, published).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn create_video(&self, video: &VideoCreation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO video_creations (id, user_id, avatar_id, image_prompt, generated_image_prompt, thumbnail_image_url, title, video_prompt, video_content_url, status, failed_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(video.id.to_string())
        .bind(&video.user_id)
        .bind(&video.avatar_id)
        .bind(&video.image_prompt)
        .bind(&video.generated_image_prompt)
        .bind(&video.thumbnail_image_url)
        .bind(&video.title)
        .bind(&video.video_prompt)
        .bind(&video.video_content_url)
        .bind(video.status.to_string())
        .bind(&video.failed_reason)
        .bind(format_datetime(&video.created_at))
        .bind(format_datetime(&video.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("video creation '{}'", video.id)))?;
        Ok(())
    }

    async fn get_video_creation(&self, id: &Uuid) -> Result<Option<VideoCreation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM video_creations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_video).transpose()
    }

    async fn list_video_creations(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> Result<Vec<VideoCreation>, RepositoryError> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(
            "SELECT * FROM video_creations WHERE user_id = ? AND (? = '' OR avatar_id = ?)
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(avatar_id)
        .bind(avatar_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_video).collect()
    }

    async fn update_video(&self, video: &VideoCreation, expected: ContentStatus) -> Result<(), RepositoryError> {
        let mut conn = self.pool.writer.acquire().await.map_err(query_err)?;
        write_video(&mut conn, video, expected).await
    }

    async fn publish_video(
        &self,
        video: &VideoCreation,
        expected: ContentStatus,
        published: &AvatarVideo,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        write_video(&mut tx, video, expected).await?;
        insert_video(&mut tx, published).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::sqlite::avatar::SqliteAvatarRepository;
    use crate::sqlite::avatar::tests::{make_avatar, seed_avatar};
    use crate::sqlite::pool::tests::temp_pool;
    use avazon_core::repository::avatar::AvatarRepository;
    use avazon_types::content::{MusicRequest, VideoImageRequest};

    fn song() -> MusicRequest {
        MusicRequest {
            title: "Song".to_string(),
            duration: 45,
            style: "pop".to_string(),
            description: "upbeat".to_string(),
        }
    }

    fn advanced(music: &MusicCreation, next: ContentStatus) -> MusicCreation {
        let mut updated = music.clone();
        updated.status = next;
        updated.updated_at = Utc::now();
        updated
    }

    #[tokio::test]
    async fn test_music_compare_and_set() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteContentRepository::new(pool);
        let music = MusicCreation::new("u1", "a1", song());
        repo.create_music(&music).await.unwrap();

        let mut painting = advanced(&music, ContentStatus::ImageProgressing);
        painting.generated_image_prompt = Some("neon album".to_string());
        repo.update_music(&painting, ContentStatus::Yet).await.unwrap();

        // A writer that still believes the row is `yet` loses.
        let stale = advanced(&music, ContentStatus::Failed);
        let err = repo.update_music(&stale, ContentStatus::Yet).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg == "status is image_progressing"));

        let stored = repo.get_music_creation(&music.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ContentStatus::ImageProgressing);
        assert_eq!(stored.generated_image_prompt.as_deref(), Some("neon album"));
        assert_eq!(stored.duration, 45);

        let ghost = MusicCreation::new("u1", "a1", song());
        assert!(matches!(
            repo.update_music(&ghost, ContentStatus::Yet).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_publish_music_marks_confirmed_once() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteContentRepository::new(pool.clone());
        let avatars = SqliteAvatarRepository::new(pool.clone());
        seed_avatar(&pool, &make_avatar("a1", "u1")).await;

        let mut music = MusicCreation::new("u1", "a1", song());
        music.status = ContentStatus::ContentCompleted;
        music.album_image_url = Some("https://cdn.test/album.png".to_string());
        music.music_url = Some("https://cdn.test/music.mp3".to_string());
        repo.create_music(&music).await.unwrap();

        let published = AvatarMusic {
            id: "m1".to_string(),
            title: music.title.clone(),
            avatar_id: "a1".to_string(),
            album_image_url: "https://cdn.test/album.png".to_string(),
            music_url: "https://cdn.test/music.mp3".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let confirmed = advanced(&music, ContentStatus::Confirmed);
        repo.publish_music(&confirmed, ContentStatus::ContentCompleted, &published)
            .await
            .unwrap();

        assert_eq!(
            repo.get_music_creation(&music.id).await.unwrap().unwrap().status,
            ContentStatus::Confirmed
        );
        assert_eq!(avatars.get_music("m1").await.unwrap().unwrap().title, "Song");

        let again = AvatarMusic {
            id: "m2".to_string(),
            ..published
        };
        let err = repo
            .publish_music(&confirmed, ContentStatus::ContentCompleted, &again)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(avatars.get_music("m2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_video_rolls_back_on_taken_id() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteContentRepository::new(pool.clone());
        seed_avatar(&pool, &make_avatar("a1", "u1")).await;

        let mut first = VideoCreation::new("u1", "a1", VideoImageRequest { prompt: "beach".into() });
        first.status = ContentStatus::ContentCompleted;
        let mut second = VideoCreation::new("u1", "a1", VideoImageRequest { prompt: "city".into() });
        second.status = ContentStatus::ContentCompleted;
        repo.create_video(&first).await.unwrap();
        repo.create_video(&second).await.unwrap();

        let published = AvatarVideo {
            id: "v1".to_string(),
            title: "Dance".to_string(),
            avatar_id: "a1".to_string(),
            thumbnail_url: "https://cdn.test/t.png".to_string(),
            video_url: "https://cdn.test/v.mp4".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut confirmed = first.clone();
        confirmed.status = ContentStatus::Confirmed;
        repo.publish_video(&confirmed, ContentStatus::ContentCompleted, &published)
            .await
            .unwrap();

        let mut confirmed = second.clone();
        confirmed.status = ContentStatus::Confirmed;
        let err = repo
            .publish_video(&confirmed, ContentStatus::ContentCompleted, &published)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg.contains("v1")));
        assert_eq!(
            repo.get_video_creation(&second.id).await.unwrap().unwrap().status,
            ContentStatus::ContentCompleted
        );
    }

    #[tokio::test]
    async fn test_creation_listing_is_per_user() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteContentRepository::new(pool);
        repo.create_video(&VideoCreation::new("u1", "a1", VideoImageRequest { prompt: "one".into() }))
            .await
            .unwrap();
        repo.create_video(&VideoCreation::new("u1", "a2", VideoImageRequest { prompt: "two".into() }))
            .await
            .unwrap();
        repo.create_video(&VideoCreation::new("u2", "a1", VideoImageRequest { prompt: "three".into() }))
            .await
            .unwrap();

        let mine = repo.list_video_creations("u1", "", PageRequest::default()).await.unwrap();
        assert_eq!(mine.iter().map(|v| v.image_prompt.as_str()).collect::<Vec<_>>(), ["two", "one"]);
        let filtered = repo.list_video_creations("u1", "a1", PageRequest::default()).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(repo.list_music_creations("u1", "", PageRequest::default()).await.unwrap().is_empty());
    }
}
