//! System prompt repository trait definition.

use avazon_types::error::RepositoryError;
use avazon_types::prompt::{Agent, SystemPrompt, SystemPromptUsage};

/// Repository trait for stored system prompts and their agent assignments.
pub trait PromptRepository: Send + Sync {
    /// Insert or replace a prompt by id. `created_at` of an existing row is kept.
    fn upsert_prompt(
        &self,
        prompt: &SystemPrompt,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_prompt(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SystemPrompt>, RepositoryError>> + Send;

    fn list_prompts(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SystemPrompt>, RepositoryError>> + Send;

    /// Delete a prompt and every assignment pointing at it.
    fn delete_prompt(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Assign a prompt to an agent, replacing any previous assignment.
    fn set_usage(
        &self,
        usage: &SystemPromptUsage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn list_usages(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SystemPromptUsage>, RepositoryError>> + Send;

    fn delete_usage(
        &self,
        agent: Agent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The prompt currently assigned to `agent`, if any.
    fn prompt_for_agent(
        &self,
        agent: Agent,
    ) -> impl std::future::Future<Output = Result<Option<SystemPrompt>, RepositoryError>> + Send;
}
