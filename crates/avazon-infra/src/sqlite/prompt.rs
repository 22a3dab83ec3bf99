//! SQLite system prompt repository.

use sqlx::sqlite::SqliteRow;

use avazon_core::repository::prompt::PromptRepository;
use avazon_types::error::RepositoryError;
use avazon_types::prompt::{Agent, SystemPrompt, SystemPromptUsage};

use super::pool::DatabasePool;
use super::{column, datetime_column, enum_column, format_datetime, query_err};

/// SQLite-backed implementation of `PromptRepository`.
pub struct SqlitePromptRepository {
    pool: DatabasePool,
}

impl SqlitePromptRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_prompt(row: &SqliteRow) -> Result<SystemPrompt, RepositoryError> {
    Ok(SystemPrompt {
        id: column(row, "id")?,
        prompt: column(row, "prompt")?,
        used_for: column(row, "used_for")?,
        category: column(row, "category")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

fn map_usage(row: &SqliteRow) -> Result<SystemPromptUsage, RepositoryError> {
    Ok(SystemPromptUsage {
        agent_id: enum_column::<Agent>(row, "agent_id")?,
        prompt_id: column(row, "prompt_id")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

impl PromptRepository for SqlitePromptRepository {
    async fn upsert_prompt(&self, prompt: &SystemPrompt) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO system_prompts (id, prompt, used_for, category, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET prompt = excluded.prompt, used_for = excluded.used_for,
                 category = excluded.category, updated_at = excluded.updated_at",
        )
        .bind(&prompt.id)
        .bind(&prompt.prompt)
        .bind(&prompt.used_for)
        .bind(&prompt.category)
        .bind(format_datetime(&prompt.created_at))
        .bind(format_datetime(&prompt.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn get_prompt(&self, id: &str) -> Result<Option<SystemPrompt>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM system_prompts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_prompt).transpose()
    }

    async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM system_prompts ORDER BY id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map_prompt).collect()
    }

    async fn delete_prompt(&self, id: &str) -> Result<(), RepositoryError> {
        // Usages go with it through ON DELETE CASCADE.
        sqlx::query("DELETE FROM system_prompts WHERE id = ?")
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn set_usage(&self, usage: &SystemPromptUsage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO system_prompt_usages (agent_id, prompt_id, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(agent_id) DO UPDATE SET prompt_id = excluded.prompt_id, updated_at = excluded.updated_at",
        )
        .bind(usage.agent_id.as_str())
        .bind(&usage.prompt_id)
        .bind(format_datetime(&usage.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => RepositoryError::NotFound,
            other => query_err(other),
        })?;
        Ok(())
    }

    async fn list_usages(&self) -> Result<Vec<SystemPromptUsage>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM system_prompt_usages ORDER BY agent_id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map_usage).collect()
    }

    async fn delete_usage(&self, agent: Agent) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM system_prompt_usages WHERE agent_id = ?")
            .bind(agent.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn prompt_for_agent(&self, agent: Agent) -> Result<Option<SystemPrompt>, RepositoryError> {
        let row = sqlx::query(
            "SELECT p.* FROM system_prompt_usages u JOIN system_prompts p ON p.id = u.prompt_id
             WHERE u.agent_id = ?",
        )
        .bind(agent.as_str())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;
        row.as_ref().map(map_prompt).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::sqlite::pool::tests::temp_pool;

    fn make_prompt(id: &str, text: &str) -> SystemPrompt {
        SystemPrompt {
            id: id.to_string(),
            prompt: text.to_string(),
            used_for: "image chat".to_string(),
            category: "avatar".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn usage(agent: Agent, prompt_id: &str) -> SystemPromptUsage {
        SystemPromptUsage {
            agent_id: agent,
            prompt_id: prompt_id.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqlitePromptRepository::new(pool);

        let mut original = make_prompt("p1", "You draw avatars.");
        original.created_at = Utc::now() - Duration::days(3);
        repo.upsert_prompt(&original).await.unwrap();

        let mut edited = make_prompt("p1", "You draw friendly avatars.");
        edited.category = "image".to_string();
        repo.upsert_prompt(&edited).await.unwrap();

        let stored = repo.get_prompt("p1").await.unwrap().unwrap();
        assert_eq!(stored.prompt, "You draw friendly avatars.");
        assert_eq!(stored.category, "image");
        assert_eq!(format_datetime(&stored.created_at), format_datetime(&original.created_at));
        assert_eq!(repo.list_prompts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_usage_resolution_and_replacement() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqlitePromptRepository::new(pool);
        repo.upsert_prompt(&make_prompt("p1", "first")).await.unwrap();
        repo.upsert_prompt(&make_prompt("p2", "second")).await.unwrap();

        assert!(repo.prompt_for_agent(Agent::ImageChat).await.unwrap().is_none());

        repo.set_usage(&usage(Agent::ImageChat, "p1")).await.unwrap();
        repo.set_usage(&usage(Agent::ImageChat, "p2")).await.unwrap();
        repo.set_usage(&usage(Agent::MusicCreate, "p1")).await.unwrap();

        let resolved = repo.prompt_for_agent(Agent::ImageChat).await.unwrap().unwrap();
        assert_eq!(resolved.prompt, "second");
        assert_eq!(repo.list_usages().await.unwrap().len(), 2);

        repo.delete_usage(Agent::ImageChat).await.unwrap();
        assert!(repo.prompt_for_agent(Agent::ImageChat).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usage_requires_prompt_and_follows_delete() {
        let (_dir, pool) = temp_pool().await;
        let repo = SqlitePromptRepository::new(pool);

        let err = repo.set_usage(&usage(Agent::VoiceChat, "missing")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        repo.upsert_prompt(&make_prompt("p1", "voice")).await.unwrap();
        repo.set_usage(&usage(Agent::VoiceChat, "p1")).await.unwrap();
        repo.delete_prompt("p1").await.unwrap();

        assert!(repo.list_usages().await.unwrap().is_empty());
        assert!(repo.get_prompt("p1").await.unwrap().is_none());
    }
}
