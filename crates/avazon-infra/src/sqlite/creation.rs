//! SQLite creation session repository.
//!
//! Implements `CreationRepository` from `avazon-core`: sessions, the three
//! attempt tables, chat turns, and the publish transaction.

use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use avazon_core::repository::creation::{CreationRepository, PublishedAttempts};
use avazon_types::avatar::Avatar;
use avazon_types::chat::CreationChat;
use avazon_types::creation::{AvatarCreation, CharacterCreation, ImageCreation, ObjectType, VoiceCreation};
use avazon_types::error::RepositoryError;
use avazon_types::status::CreationStatus;

use super::avatar::insert_avatar;
use super::pool::DatabasePool;
use super::{
    column, datetime_column, enum_column, format_datetime, insert_err, parse_enum, query_err, uuid_column,
};

/// SQLite-backed implementation of `CreationRepository`.
pub struct SqliteCreationRepository {
    pool: DatabasePool,
}

impl SqliteCreationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_creation(row: &SqliteRow) -> Result<AvatarCreation, RepositoryError> {
    Ok(AvatarCreation {
        id: uuid_column(row, "id")?,
        user_id: column(row, "user_id")?,
        name: column(row, "name")?,
        species: column(row, "species")?,
        gender: column(row, "gender")?,
        age: column(row, "age")?,
        language: column(row, "language")?,
        country: column(row, "country")?,
        image_style: column(row, "image_style")?,
        description: column(row, "description")?,
        status: enum_column(row, "status")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
        last_active_at: datetime_column(row, "last_active_at")?,
    })
}

fn map_image(row: &SqliteRow) -> Result<ImageCreation, RepositoryError> {
    Ok(ImageCreation {
        id: uuid_column(row, "id")?,
        creation_id: uuid_column(row, "creation_id")?,
        attempt: column(row, "attempt")?,
        status: enum_column(row, "status")?,
        summary: column(row, "summary")?,
        generated_prompt: column(row, "generated_prompt")?,
        image_url: column(row, "image_url")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn map_character(row: &SqliteRow) -> Result<CharacterCreation, RepositoryError> {
    Ok(CharacterCreation {
        id: uuid_column(row, "id")?,
        creation_id: uuid_column(row, "creation_id")?,
        attempt: column(row, "attempt")?,
        status: enum_column(row, "status")?,
        generated_character: column(row, "generated_character")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn map_voice(row: &SqliteRow) -> Result<VoiceCreation, RepositoryError> {
    Ok(VoiceCreation {
        id: uuid_column(row, "id")?,
        creation_id: uuid_column(row, "creation_id")?,
        attempt: column(row, "attempt")?,
        status: enum_column(row, "status")?,
        summary: column(row, "summary")?,
        gender: enum_column(row, "gender")?,
        accent: enum_column(row, "accent")?,
        accent_strength: column(row, "accent_strength")?,
        age: enum_column(row, "age")?,
        generated_prompt: column(row, "generated_prompt")?,
        provider: column(row, "provider")?,
        voice_id: column(row, "voice_id")?,
        sample_text: column(row, "sample_text")?,
        voice_url: column(row, "voice_url")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn map_chat(row: &SqliteRow) -> Result<CreationChat, RepositoryError> {
    Ok(CreationChat {
        id: uuid_column(row, "id")?,
        creation_id: uuid_column(row, "creation_id")?,
        object_type: enum_column(row, "object_type")?,
        role: enum_column(row, "role")?,
        content: column(row, "content")?,
        tool_call_id: column(row, "tool_call_id")?,
        tool_call_name: column(row, "tool_call_name")?,
        tool_call_args: column(row, "tool_call_args")?,
        created_object_number: column(row, "created_object_number")?,
        created_at: datetime_column(row, "created_at")?,
    })
}

fn expect_one(rows_affected: u64) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

impl SqliteCreationRepository {
    async fn list_attempts<T>(
        &self,
        table: &'static str,
        creation_id: &Uuid,
        map: fn(&SqliteRow) -> Result<T, RepositoryError>,
    ) -> Result<Vec<T>, RepositoryError> {
        let sql = format!("SELECT * FROM {table} WHERE creation_id = ? ORDER BY attempt ASC");
        let rows = sqlx::query(&sql)
            .bind(creation_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map).collect()
    }
}

impl CreationRepository for SqliteCreationRepository {
    async fn create_creation(&self, creation: &AvatarCreation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO avatar_creations (id, user_id, name, species, gender, age, language, country, image_style, description, status, failed_reason, created_at, updated_at, last_active_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(creation.id.to_string())
        .bind(&creation.user_id)
        .bind(&creation.name)
        .bind(&creation.species)
        .bind(&creation.gender)
        .bind(creation.age)
        .bind(&creation.language)
        .bind(&creation.country)
        .bind(&creation.image_style)
        .bind(&creation.description)
        .bind(creation.status.to_string())
        .bind(&creation.failed_reason)
        .bind(format_datetime(&creation.created_at))
        .bind(format_datetime(&creation.updated_at))
        .bind(format_datetime(&creation.last_active_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("creation '{}'", creation.id)))?;
        Ok(())
    }

    async fn get_creation(&self, id: &Uuid) -> Result<Option<AvatarCreation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM avatar_creations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_creation).transpose()
    }

    async fn list_active_creations(&self, user_id: &str) -> Result<Vec<AvatarCreation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM avatar_creations WHERE user_id = ? AND status IN ('ready', 'processing')
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_creation).collect()
    }

    async fn update_creation(&self, creation: &AvatarCreation) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE avatar_creations SET status = ?, failed_reason = ?, updated_at = ?, last_active_at = ?
             WHERE id = ?",
        )
        .bind(creation.status.to_string())
        .bind(&creation.failed_reason)
        .bind(format_datetime(&creation.updated_at))
        .bind(format_datetime(&creation.last_active_at))
        .bind(creation.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        expect_one(result.rows_affected())
    }

    async fn insert_image(&self, image: &ImageCreation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO image_creations (id, creation_id, attempt, status, summary, generated_prompt, image_url, failed_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(image.id.to_string())
        .bind(image.creation_id.to_string())
        .bind(image.attempt)
        .bind(image.status.to_string())
        .bind(&image.summary)
        .bind(&image.generated_prompt)
        .bind(&image.image_url)
        .bind(&image.failed_reason)
        .bind(format_datetime(&image.created_at))
        .bind(format_datetime(&image.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("image attempt {}", image.attempt)))?;
        Ok(())
    }

    async fn update_image(&self, image: &ImageCreation) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE image_creations SET status = ?, summary = ?, generated_prompt = ?, image_url = ?, failed_reason = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(image.status.to_string())
        .bind(&image.summary)
        .bind(&image.generated_prompt)
        .bind(&image.image_url)
        .bind(&image.failed_reason)
        .bind(format_datetime(&image.updated_at))
        .bind(image.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        expect_one(result.rows_affected())
    }

    async fn list_images(&self, creation_id: &Uuid) -> Result<Vec<ImageCreation>, RepositoryError> {
        self.list_attempts("image_creations", creation_id, map_image).await
    }

    async fn insert_character(&self, character: &CharacterCreation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO character_creations (id, creation_id, attempt, status, generated_character, failed_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(character.id.to_string())
        .bind(character.creation_id.to_string())
        .bind(character.attempt)
        .bind(character.status.to_string())
        .bind(&character.generated_character)
        .bind(&character.failed_reason)
        .bind(format_datetime(&character.created_at))
        .bind(format_datetime(&character.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("character attempt {}", character.attempt)))?;
        Ok(())
    }

    async fn update_character(&self, character: &CharacterCreation) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE character_creations SET status = ?, generated_character = ?, failed_reason = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(character.status.to_string())
        .bind(&character.generated_character)
        .bind(&character.failed_reason)
        .bind(format_datetime(&character.updated_at))
        .bind(character.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        expect_one(result.rows_affected())
    }

    async fn list_characters(&self, creation_id: &Uuid) -> Result<Vec<CharacterCreation>, RepositoryError> {
        self.list_attempts("character_creations", creation_id, map_character).await
    }

    async fn insert_voice(&self, voice: &VoiceCreation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO voice_creations (id, creation_id, attempt, status, summary, gender, accent, accent_strength, age, generated_prompt, provider, voice_id, sample_text, voice_url, failed_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(voice.id.to_string())
        .bind(voice.creation_id.to_string())
        .bind(voice.attempt)
        .bind(voice.status.to_string())
        .bind(&voice.summary)
        .bind(voice.gender.to_string())
        .bind(voice.accent.to_string())
        .bind(voice.accent_strength)
        .bind(voice.age.to_string())
        .bind(&voice.generated_prompt)
        .bind(&voice.provider)
        .bind(&voice.voice_id)
        .bind(&voice.sample_text)
        .bind(&voice.voice_url)
        .bind(&voice.failed_reason)
        .bind(format_datetime(&voice.created_at))
        .bind(format_datetime(&voice.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("voice attempt {}", voice.attempt)))?;
        Ok(())
    }

    async fn update_voice(&self, voice: &VoiceCreation) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE voice_creations SET status = ?, generated_prompt = ?, provider = ?, voice_id = ?, sample_text = ?, voice_url = ?, failed_reason = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(voice.status.to_string())
        .bind(&voice.generated_prompt)
        .bind(&voice.provider)
        .bind(&voice.voice_id)
        .bind(&voice.sample_text)
        .bind(&voice.voice_url)
        .bind(&voice.failed_reason)
        .bind(format_datetime(&voice.updated_at))
        .bind(voice.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        expect_one(result.rows_affected())
    }

    async fn list_voices(&self, creation_id: &Uuid) -> Result<Vec<VoiceCreation>, RepositoryError> {
        self.list_attempts("voice_creations", creation_id, map_voice).await
    }

    async fn save_chat(&self, chat: &CreationChat) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO creation_chats (id, creation_id, object_type, role, content, tool_call_id, tool_call_name, tool_call_args, created_object_number, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chat.id.to_string())
        .bind(chat.creation_id.to_string())
        .bind(chat.object_type.to_string())
        .bind(chat.role.to_string())
        .bind(&chat.content)
        .bind(&chat.tool_call_id)
        .bind(&chat.tool_call_name)
        .bind(&chat.tool_call_args)
        .bind(chat.created_object_number)
        .bind(format_datetime(&chat.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn list_chats(
        &self,
        creation_id: &Uuid,
        object_type: Option<ObjectType>,
    ) -> Result<Vec<CreationChat>, RepositoryError> {
        let object_type = object_type.map(|t| t.to_string()).unwrap_or_default();
        let rows = sqlx::query(
            "SELECT * FROM creation_chats WHERE creation_id = ? AND (? = '' OR object_type = ?)
             ORDER BY rowid ASC",
        )
        .bind(creation_id.to_string())
        .bind(&object_type)
        .bind(&object_type)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_chat).collect()
    }

    async fn publish_avatar(
        &self,
        creation_id: &Uuid,
        attempts: &PublishedAttempts,
        avatar: &Avatar,
    ) -> Result<(), RepositoryError> {
        // Dropping `tx` on any error path rolls everything back.
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let status = sqlx::query_scalar::<_, String>("SELECT status FROM avatar_creations WHERE id = ?")
            .bind(creation_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?
            .ok_or(RepositoryError::NotFound)?;
        let status: CreationStatus = parse_enum(&status)?;
        if !matches!(
            status,
            CreationStatus::Ready | CreationStatus::Processing | CreationStatus::Completed
        ) {
            return Err(RepositoryError::Conflict("creation session is not active".to_string()));
        }

        let published = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM avatars WHERE avatar_creation_id = ?",
        )
        .bind(creation_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(query_err)?;
        if published > 0 {
            return Err(RepositoryError::Conflict(
                "creation session already published an avatar".to_string(),
            ));
        }

        for (table, expected) in [
            ("image_creations", &attempts.image),
            ("character_creations", &attempts.character),
            ("voice_creations", &attempts.voice),
        ] {
            if !is_latest_completed(&mut tx, table, creation_id, expected).await? {
                return Err(RepositoryError::Conflict(
                    "published attempts are no longer the latest completed ones".to_string(),
                ));
            }
        }

        sqlx::query("UPDATE avatar_creations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(CreationStatus::Completed.to_string())
            .bind(format_datetime(&chrono::Utc::now()))
            .bind(creation_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        insert_avatar(&mut tx, avatar).await?;

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }
}

/// Whether `expected` is the newest attempt in `table` and has completed.
async fn is_latest_completed(
    conn: &mut SqliteConnection,
    table: &'static str,
    creation_id: &Uuid,
    expected: &Uuid,
) -> Result<bool, RepositoryError> {
    let sql = format!(
        "SELECT id, status FROM {table} WHERE creation_id = ? ORDER BY attempt DESC LIMIT 1"
    );
    let latest: Option<(String, String)> = sqlx::query_as(&sql)
        .bind(creation_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(query_err)?;
    Ok(latest.is_some_and(|(id, status)| {
        id == expected.to_string() && status == CreationStatus::Completed.to_string()
    }))
}
