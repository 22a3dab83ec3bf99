//! System prompt service.
//!
//! Resolves agent → prompt assignments, runs one-shot completions through
//! them, and carries the administrative create/assign/delete operations.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use avazon_types::error::PromptError;
use avazon_types::prompt::{Agent, SystemPrompt, SystemPromptUsage, UpsertPromptRequest};

use crate::agent::sub_agent::SubAgent;
use crate::llm::box_provider::BoxLlmProvider;
use crate::repository::prompt::PromptRepository;

use super::defaults::fallback_prompt;
use super::registry::PromptRegistry;

/// Service over stored system prompts.
///
/// Cloning is cheap; clones share the repository and provider.
pub struct PromptService<P: PromptRepository> {
    repo: Arc<P>,
    llm: Arc<BoxLlmProvider>,
    model: String,
}

impl<P: PromptRepository> Clone for PromptService<P> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            llm: Arc::clone(&self.llm),
            model: self.model.clone(),
        }
    }
}

impl<P: PromptRepository> PromptService<P> {
    pub fn new(repo: Arc<P>, llm: Arc<BoxLlmProvider>, model: impl Into<String>) -> Self {
        Self {
            repo,
            llm,
            model: model.into(),
        }
    }

    /// Create or replace the prompt stored under `id`.
    pub async fn upsert_prompt(
        &self,
        id: &str,
        request: UpsertPromptRequest,
    ) -> Result<SystemPrompt, PromptError> {
        request.validate()?;
        let id = id.trim();
        if id.is_empty() {
            return Err(avazon_types::error::ValidationError::new("id", "must not be empty").into());
        }

        let now = Utc::now();
        let created_at = self
            .repo
            .get_prompt(id)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let prompt = SystemPrompt {
            id: id.to_string(),
            prompt: request.prompt,
            used_for: request.used_for,
            category: request.category,
            created_at,
            updated_at: now,
        };
        self.repo.upsert_prompt(&prompt).await?;

        info!(prompt_id = %prompt.id, "upserted system prompt");
        Ok(prompt)
    }

    pub async fn list_prompts(&self) -> Result<Vec<SystemPrompt>, PromptError> {
        Ok(self.repo.list_prompts().await?)
    }

    /// Delete a prompt together with any assignment pointing at it.
    pub async fn delete_prompt(&self, id: &str) -> Result<(), PromptError> {
        if self.repo.get_prompt(id).await?.is_none() {
            return Err(PromptError::NotFound);
        }
        self.repo.delete_prompt(id).await?;
        info!(prompt_id = %id, "deleted system prompt");
        Ok(())
    }

    /// Assign an existing prompt to `agent`.
    pub async fn set_usage(
        &self,
        agent: Agent,
        prompt_id: &str,
    ) -> Result<SystemPromptUsage, PromptError> {
        if self.repo.get_prompt(prompt_id).await?.is_none() {
            return Err(PromptError::NotFound);
        }
        let usage = SystemPromptUsage {
            agent_id: agent,
            prompt_id: prompt_id.to_string(),
            updated_at: Utc::now(),
        };
        self.repo.set_usage(&usage).await?;
        info!(agent = %agent, prompt_id = %prompt_id, "assigned system prompt");
        Ok(usage)
    }

    pub async fn list_usages(&self) -> Result<Vec<SystemPromptUsage>, PromptError> {
        Ok(self.repo.list_usages().await?)
    }

    pub async fn delete_usage(&self, agent: Agent) -> Result<(), PromptError> {
        self.repo.delete_usage(agent).await?;
        Ok(())
    }
}

impl<P: PromptRepository> PromptRegistry for PromptService<P> {
    async fn get_system_prompt(&self, agent: Agent) -> Result<String, PromptError> {
        match self.repo.prompt_for_agent(agent).await? {
            Some(prompt) => Ok(prompt.prompt),
            None => Err(PromptError::Unassigned(agent.to_string())),
        }
    }

    async fn use_prompt(&self, agent: Agent, input: &str) -> Result<String, PromptError> {
        let system_prompt = match self.get_system_prompt(agent).await {
            Ok(prompt) => prompt,
            Err(PromptError::Unassigned(_)) => fallback_prompt(agent).to_string(),
            Err(e) => {
                warn!(agent = %agent, error = %e, "prompt lookup failed, using built-in prompt");
                fallback_prompt(agent).to_string()
            }
        };

        let mut assistant = SubAgent::new(agent.as_str(), Arc::clone(&self.llm), self.model.clone());
        assistant.set_system_prompt(system_prompt);
        assistant
            .handle(input)
            .await
            .map_err(|e| PromptError::Completion(e.to_string()))
    }
}
