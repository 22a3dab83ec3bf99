//! LLM provider implementations.
//!
//! Avazon talks to a single OpenAI-compatible endpoint configured under
//! `[llm]` in `config.toml`; [`create_provider`] builds it as a
//! [`BoxLlmProvider`] for the session engine and prompt services.

pub mod openai_compat;

use std::time::Duration;

use secrecy::SecretString;

use avazon_core::llm::box_provider::BoxLlmProvider;
use avazon_types::config::LlmConfig;
use avazon_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;

/// Provider name reported in logs and `gen_ai.system` span fields.
pub const PROVIDER_NAME: &str = "openai";

/// Create a [`BoxLlmProvider`] from the `[llm]` config section.
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] when no API key is available.
pub fn create_provider(config: &LlmConfig, api_key: Option<SecretString>) -> Result<BoxLlmProvider, LlmError> {
    let key = api_key.ok_or(LlmError::AuthenticationFailed)?;
    let provider = OpenAiCompatibleProvider::new(
        PROVIDER_NAME,
        config.base_url.clone(),
        key,
        config.model.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(BoxLlmProvider::new(provider))
}
