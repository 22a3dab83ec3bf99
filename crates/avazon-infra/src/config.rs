//! Configuration and secret loading for Avazon.
//!
//! Reads `config.toml` from the data directory (`~/.avazon/` in production)
//! into [`AppConfig`], falling back to defaults when the file is missing or
//! malformed. API keys and signing secrets come only from the environment.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use avazon_types::config::AppConfig;

pub const DATA_DIR_ENV: &str = "AVAZON_DATA_DIR";
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AVAZON_DATA_DIR` environment variable
/// 2. `~/.avazon`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".avazon");
    }
    PathBuf::from(".avazon")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unreadable or unparsable file: a warning, then the default.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            AppConfig::default()
        }
    }
}

/// Secrets read from environment variables.
///
/// Does NOT derive Debug; `SecretString` already redacts, but the struct
/// is never meant to be printed.
#[derive(Default)]
pub struct Secrets {
    pub openai_api_key: Option<SecretString>,
    pub openart_api_key: Option<SecretString>,
    pub elevenlabs_api_key: Option<SecretString>,
    pub runway_api_key: Option<SecretString>,
    pub jenai_api_key: Option<SecretString>,
    pub aws_access_key_id: Option<SecretString>,
    pub aws_secret_access_key: Option<SecretString>,
    pub aws_session_token: Option<SecretString>,
    pub token_secret: Option<SecretString>,
    pub admin_key: Option<SecretString>,
}

impl Secrets {
    pub const OPENAI_API_KEY: &'static str = "OPENAI_API_KEY";
    pub const OPENART_API_KEY: &'static str = "OPENART_API_KEY";
    pub const ELEVENLABS_API_KEY: &'static str = "ELEVENLABS_API_KEY";
    pub const RUNWAY_API_KEY: &'static str = "RUNWAY_API_KEY";
    pub const JENAI_API_KEY: &'static str = "JENAI_API_KEY";
    pub const AWS_ACCESS_KEY_ID: &'static str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &'static str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_SESSION_TOKEN: &'static str = "AWS_SESSION_TOKEN";
    pub const TOKEN_SECRET: &'static str = "AVAZON_TOKEN_SECRET";
    pub const ADMIN_KEY: &'static str = "AVAZON_ADMIN_KEY";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(SecretString::from)
        };
        Self {
            openai_api_key: get(Self::OPENAI_API_KEY),
            openart_api_key: get(Self::OPENART_API_KEY),
            elevenlabs_api_key: get(Self::ELEVENLABS_API_KEY),
            runway_api_key: get(Self::RUNWAY_API_KEY),
            jenai_api_key: get(Self::JENAI_API_KEY),
            aws_access_key_id: get(Self::AWS_ACCESS_KEY_ID),
            aws_secret_access_key: get(Self::AWS_SECRET_ACCESS_KEY),
            aws_session_token: get(Self::AWS_SESSION_TOKEN),
            token_secret: get(Self::TOKEN_SECRET),
            admin_key: get(Self::ADMIN_KEY),
        }
    }

    /// Names of the provider keys that are not set.
    pub fn missing_provider_keys(&self) -> Vec<&'static str> {
        [
            (Self::OPENAI_API_KEY, self.openai_api_key.is_some()),
            (Self::OPENART_API_KEY, self.openart_api_key.is_some()),
            (Self::ELEVENLABS_API_KEY, self.elevenlabs_api_key.is_some()),
            (Self::RUNWAY_API_KEY, self.runway_api_key.is_some()),
            (Self::JENAI_API_KEY, self.jenai_api_key.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| (!present).then_some(name))
        .collect()
    }
}
