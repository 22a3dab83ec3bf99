//! SQLite published avatar repository.
//!
//! Reads are served here; the rows themselves are written by the publishing
//! transactions in `creation`, `content`, and `remix` through the
//! `insert_*` helpers below.

use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;

use avazon_core::repository::avatar::AvatarRepository;
use avazon_types::avatar::{Avatar, AvatarMusic, AvatarVideo, PageRequest};
use avazon_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{column, datetime_column, format_datetime, insert_err, page_bounds, parse_uuid, query_err};

/// SQLite-backed implementation of `AvatarRepository`.
pub struct SqliteAvatarRepository {
    pool: DatabasePool,
}

impl SqliteAvatarRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_avatar(row: &SqliteRow) -> Result<Avatar, RepositoryError> {
    let avatar_creation_id = column::<Option<String>>(row, "avatar_creation_id")?
        .as_deref()
        .map(parse_uuid)
        .transpose()?;
    Ok(Avatar {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        avatar_creation_id,
        remix_avatar_id: column(row, "remix_avatar_id")?,
        name: column(row, "name")?,
        species: column(row, "species")?,
        gender: column(row, "gender")?,
        language: column(row, "language")?,
        country: column(row, "country")?,
        description: column(row, "description")?,
        profile_image_url: column(row, "profile_image_url")?,
        voice_id: column(row, "voice_id")?,
        voice_url: column(row, "voice_url")?,
        character_description: column(row, "character_description")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

fn map_music(row: &SqliteRow) -> Result<AvatarMusic, RepositoryError> {
    Ok(AvatarMusic {
        id: column(row, "id")?,
        title: column(row, "title")?,
        avatar_id: column(row, "avatar_id")?,
        album_image_url: column(row, "album_image_url")?,
        music_url: column(row, "music_url")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn map_video(row: &SqliteRow) -> Result<AvatarVideo, RepositoryError> {
    Ok(AvatarVideo {
        id: column(row, "id")?,
        title: column(row, "title")?,
        avatar_id: column(row, "avatar_id")?,
        thumbnail_url: column(row, "thumbnail_url")?,
        video_url: column(row, "video_url")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

/// Insert a published avatar. A taken id is a `Conflict`.
pub(crate) async fn insert_avatar(conn: &mut SqliteConnection, avatar: &Avatar) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO avatars (id, user_id, avatar_creation_id, remix_avatar_id, name, species, gender, language, country, description, profile_image_url, voice_id, voice_url, character_description, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&avatar.id)
    .bind(&avatar.user_id)
    .bind(avatar.avatar_creation_id.map(|id| id.to_string()))
    .bind(&avatar.remix_avatar_id)
    .bind(&avatar.name)
    .bind(&avatar.species)
    .bind(&avatar.gender)
    .bind(&avatar.language)
    .bind(&avatar.country)
    .bind(&avatar.description)
    .bind(&avatar.profile_image_url)
    .bind(&avatar.voice_id)
    .bind(&avatar.voice_url)
    .bind(&avatar.character_description)
    .bind(format_datetime(&avatar.created_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| insert_err(e, || format!("avatar '{}'", avatar.id)))?;
    Ok(())
}

pub(crate) async fn insert_music(conn: &mut SqliteConnection, music: &AvatarMusic) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO avatar_musics (id, title, avatar_id, album_image_url, music_url, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&music.id)
    .bind(&music.title)
    .bind(&music.avatar_id)
    .bind(&music.album_image_url)
    .bind(&music.music_url)
    .bind(format_datetime(&music.created_at))
    .bind(format_datetime(&music.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| insert_err(e, || format!("music '{}'", music.id)))?;
    Ok(())
}

pub(crate) async fn insert_video(conn: &mut SqliteConnection, video: &AvatarVideo) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO avatar_videos (id, title, avatar_id, thumbnail_url, video_url, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&video.id)
    .bind(&video.title)
    .bind(&video.avatar_id)
    .bind(&video.thumbnail_url)
    .bind(&video.video_url)
    .bind(format_datetime(&video.created_at))
    .bind(format_datetime(&video.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| insert_err(e, || format!("video '{}'", video.id)))?;
    Ok(())
}

impl AvatarRepository for SqliteAvatarRepository {
    async fn get_avatar(&self, id: &str) -> Result<Option<Avatar>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM avatars WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_avatar).transpose()
    }

    async fn list_avatars(&self, page: PageRequest) -> Result<Vec<Avatar>, RepositoryError> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query("SELECT * FROM avatars ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map_avatar).collect()
    }

    async fn get_music(&self, id: &str) -> Result<Option<AvatarMusic>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM avatar_musics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_music).transpose()
    }

    async fn list_musics(&self, avatar_id: &str, page: PageRequest) -> Result<Vec<AvatarMusic>, RepositoryError> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(
            "SELECT * FROM avatar_musics WHERE (? = '' OR avatar_id = ?)
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(avatar_id)
        .bind(avatar_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_music).collect()
    }

    async fn get_video(&self, id: &str) -> Result<Option<AvatarVideo>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM avatar_videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_video).transpose()
    }

    async fn list_videos(&self, avatar_id: &str, page: PageRequest) -> Result<Vec<AvatarVideo>, RepositoryError> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(
            "SELECT * FROM avatar_videos WHERE (? = '' OR avatar_id = ?)
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(avatar_id)
        .bind(avatar_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_video).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::sqlite::pool::tests::temp_pool;

    pub(crate) fn make_avatar(id: &str, user_id: &str) -> Avatar {
        Avatar {
            id: id.to_string(),
            user_id: user_id.to_string(),
            avatar_creation_id: None,
            remix_avatar_id: None,
            name: "Mira".to_string(),
            species: "fox".to_string(),
            gender: "female".to_string(),
            language: "en".to_string(),
            country: "KR".to_string(),
            description: Some("a curious fox".to_string()),
            profile_image_url: format!("https://cdn.test/{id}/image.png"),
            voice_id: Some("voice-1".to_string()),
            voice_url: format!("https://cdn.test/{id}/voice.mp3"),
            character_description: "Warm and witty.".to_string(),
            created_at: Utc::now(),
        }
    }

    pub(crate) async fn seed_avatar(pool: &DatabasePool, avatar: &Avatar) {
        let mut conn = pool.writer.acquire().await.unwrap();
        insert_avatar(&mut conn, avatar).await.unwrap();
    }

    fn make_music(id: &str, avatar_id: &str, minutes_ago: i64) -> AvatarMusic {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        AvatarMusic {
            id: id.to_string(),
            title: format!("Song {id}"),
            avatar_id: avatar_id.to_string(),
            album_image_url: format!("https://cdn.test/album{id}.png"),
            music_url: format!("https://cdn.test/music{id}.mp3"),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_avatar_roundtrip_and_conflict() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAvatarRepository::new(pool.clone());
        let avatar = make_avatar("mira", "u1");
        seed_avatar(&pool, &avatar).await;

        let found = repo.get_avatar("mira").await.unwrap().unwrap();
        assert_eq!(found.name, "Mira");
        assert_eq!(found.description.as_deref(), Some("a curious fox"));
        assert!(found.avatar_creation_id.is_none());
        assert!(repo.get_avatar("nobody").await.unwrap().is_none());

        let mut conn = pool.writer.acquire().await.unwrap();
        let err = insert_avatar(&mut conn, &avatar).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg.contains("mira")));
    }

    #[tokio::test]
    async fn test_list_avatars_newest_first_with_paging() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAvatarRepository::new(pool.clone());
        for (i, id) in ["a1", "a2", "a3"].into_iter().enumerate() {
            let mut avatar = make_avatar(id, "u1");
            avatar.created_at = Utc::now() - Duration::minutes(10 - i as i64);
            seed_avatar(&pool, &avatar).await;
        }

        let first = repo.list_avatars(PageRequest::new(0, 2)).await.unwrap();
        assert_eq!(first.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), ["a3", "a2"]);
        let second = repo.list_avatars(PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(second.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), ["a1"]);
    }

    #[tokio::test]
    async fn test_music_listing_filters_by_avatar() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqliteAvatarRepository::new(pool.clone());
        seed_avatar(&pool, &make_avatar("a1", "u1")).await;
        seed_avatar(&pool, &make_avatar("a2", "u2")).await;

        let mut conn = pool.writer.acquire().await.unwrap();
        insert_music(&mut conn, &make_music("m1", "a1", 3)).await.unwrap();
        insert_music(&mut conn, &make_music("m2", "a2", 2)).await.unwrap();
        insert_music(&mut conn, &make_music("m3", "a1", 1)).await.unwrap();
        drop(conn);

        let all = repo.list_musics("", PageRequest::default()).await.unwrap();
        assert_eq!(all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["m3", "m2", "m1"]);
        let mine = repo.list_musics("a1", PageRequest::default()).await.unwrap();
        assert_eq!(mine.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["m3", "m1"]);
        assert_eq!(repo.get_music("m2").await.unwrap().unwrap().avatar_id, "a2");
        assert!(repo.list_videos("", PageRequest::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_published_content_requires_avatar() {
        let (_dir, pool) = temp_pool().await;
        let mut conn = pool.writer.acquire().await.unwrap();
        let video = AvatarVideo {
            id: "v1".to_string(),
            title: "Dance".to_string(),
            avatar_id: "ghost".to_string(),
            thumbnail_url: "https://cdn.test/t.png".to_string(),
            video_url: "https://cdn.test/v.mp4".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = insert_video(&mut conn, &video).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
    }
}
