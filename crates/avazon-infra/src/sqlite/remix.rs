//! SQLite avatar remix repository.

use sqlx::SqliteConnection;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use avazon_core::repository::remix::RemixRepository;
use avazon_types::avatar::{Avatar, PageRequest};
use avazon_types::error::RepositoryError;
use avazon_types::remix::AvatarRemix;
use avazon_types::status::RemixStatus;

use super::avatar::insert_avatar;
use super::pool::DatabasePool;
use super::{
    column, datetime_column, enum_column, format_datetime, insert_err, page_bounds, query_err, uuid_column,
};

/// SQLite-backed implementation of `RemixRepository`.
pub struct SqliteRemixRepository {
    pool: DatabasePool,
}

impl SqliteRemixRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_remix(row: &SqliteRow) -> Result<AvatarRemix, RepositoryError> {
    Ok(AvatarRemix {
        id: uuid_column(row, "id")?,
        user_id: column(row, "user_id")?,
        avatar_id: column(row, "avatar_id")?,
        prompt: column(row, "prompt")?,
        image_url: column(row, "image_url")?,
        status: enum_column(row, "status")?,
        failed_reason: column(row, "failed_reason")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

async fn write_remix(
    conn: &mut SqliteConnection,
    remix: &AvatarRemix,
    expected: RemixStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE avatar_remixes SET image_url = ?, status = ?, failed_reason = ?, updated_at = ?
         WHERE id = ? AND status = ?",
    )
    .bind(&remix.image_url)
    .bind(remix.status.to_string())
    .bind(&remix.failed_reason)
    .bind(format_datetime(&remix.updated_at))
    .bind(remix.id.to_string())
    .bind(expected.to_string())
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;
    if result.rows_affected() > 0 {
        return Ok(());
    }

    let current = sqlx::query_scalar::<_, String>("SELECT status FROM avatar_remixes WHERE id = ?")
        .bind(remix.id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(query_err)?;
    Err(match current {
        Some(status) => RepositoryError::Conflict(format!("status is {status}")),
        None => RepositoryError::NotFound,
    })
}

impl RemixRepository for SqliteRemixRepository {
    async fn create_remix(&self, remix: &AvatarRemix) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO avatar_remixes (id, user_id, avatar_id, prompt, image_url, status, failed_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(remix.id.to_string())
        .bind(&remix.user_id)
        .bind(&remix.avatar_id)
        .bind(&remix.prompt)
        .bind(&remix.image_url)
        .bind(remix.status.to_string())
        .bind(&remix.failed_reason)
        .bind(format_datetime(&remix.created_at))
        .bind(format_datetime(&remix.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| insert_err(e, || format!("remix '{}'", remix.id)))?;
        Ok(())
    }

    async fn get_remix(&self, id: &Uuid) -> Result<Option<AvatarRemix>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM avatar_remixes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_remix).transpose()
    }

    async fn list_remixes(
        &self,
        user_id: &str,
        avatar_id: &str,
        page: PageRequest,
    ) -> Result<Vec<AvatarRemix>, RepositoryError> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(
            "SELECT * FROM avatar_remixes WHERE user_id = ? AND (? = '' OR avatar_id = ?)
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
        rows.iter().map(map_remix).collect()
    }

    async fn update_remix(&self, remix: &AvatarRemix, expected: RemixStatus) -> Result<(), RepositoryError> {
        let mut conn = self.pool.writer.acquire().await.map_err(query_err)?;
        write_remix(&mut conn, remix, expected).await
    }

    async fn publish_remix(
        &self,
        remix: &AvatarRemix,
        expected: RemixStatus,
        avatar: &Avatar,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        write_remix(&mut tx, remix, expected).await?;
        insert_avatar(&mut tx, avatar).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(())
    }
}
