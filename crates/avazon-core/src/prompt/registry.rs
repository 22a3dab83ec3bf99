//! PromptRegistry trait and its type-erased wrapper.

use std::future::Future;
use std::pin::Pin;

use avazon_types::error::PromptError;
use avazon_types::prompt::Agent;

/// Lookup of agent system prompts and one-shot completions through them.
pub trait PromptRegistry: Send + Sync {
    /// The stored prompt assigned to `agent`.
    ///
    /// Returns `Unassigned` when no prompt is mapped to the agent.
    fn get_system_prompt(
        &self,
        agent: Agent,
    ) -> impl Future<Output = Result<String, PromptError>> + Send;

    /// Run `input` through a one-shot completion under `agent`'s prompt,
    /// using the built-in prompt when none is assigned.
    fn use_prompt(
        &self,
        agent: Agent,
        input: &str,
    ) -> impl Future<Output = Result<String, PromptError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PromptError>> + Send + 'a>>;

/// Object-safe version of [`PromptRegistry`].
pub trait PromptRegistryDyn: Send + Sync {
    fn get_system_prompt_boxed(&self, agent: Agent) -> BoxFuture<'_, String>;
    fn use_prompt_boxed<'a>(&'a self, agent: Agent, input: &'a str) -> BoxFuture<'a, String>;
}

impl<T: PromptRegistry> PromptRegistryDyn for T {
    fn get_system_prompt_boxed(&self, agent: Agent) -> BoxFuture<'_, String> {
        Box::pin(self.get_system_prompt(agent))
    }

    fn use_prompt_boxed<'a>(&'a self, agent: Agent, input: &'a str) -> BoxFuture<'a, String> {
        Box::pin(self.use_prompt(agent, input))
    }
}

/// Type-erased prompt registry shared by the session engine and pipelines.
pub struct BoxPromptRegistry {
    inner: Box<dyn PromptRegistryDyn>,
}

impl BoxPromptRegistry {
    pub fn new<T: PromptRegistry + 'static>(registry: T) -> Self {
        Self {
            inner: Box::new(registry),
        }
    }

    pub async fn get_system_prompt(&self, agent: Agent) -> Result<String, PromptError> {
        self.inner.get_system_prompt_boxed(agent).await
    }

    /// The assigned prompt, or the built-in fallback if the lookup fails.
    pub async fn system_prompt_or_default(&self, agent: Agent) -> String {
        match self.get_system_prompt(agent).await {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::debug!(agent = %agent, error = %e, "using built-in system prompt");
                super::defaults::fallback_prompt(agent).to_string()
            }
        }
    }

    pub async fn use_prompt(&self, agent: Agent, input: &str) -> Result<String, PromptError> {
        self.inner.use_prompt_boxed(agent, input).await
    }
}
