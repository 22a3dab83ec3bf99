//! Application configuration types for Avazon.
//!
//! `AppConfig` represents the top-level `config.toml` in the data directory.
//! Every section and field has a default so a partial file is valid. Secrets
//! (API keys) are never read from this file; they come from the environment.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file name, relative to the data directory.
    #[serde(default = "default_db_file")]
    pub file: String,
}

fn default_db_file() -> String {
    "avazon.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: default_db_file(),
        }
    }
}

/// Creation session registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are evicted. `0` disables eviction.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// How often the idle sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Capacity of each object-type actor's inbound queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    32
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Chat completion settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Generation provider endpoints and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_openart_base_url")]
    pub openart_base_url: String,
    #[serde(default = "default_elevenlabs_base_url")]
    pub elevenlabs_base_url: String,
    #[serde(default = "default_runway_base_url")]
    pub runway_base_url: String,
    #[serde(default = "default_jenai_base_url")]
    pub jenai_base_url: String,
    #[serde(default = "default_image_poll_secs")]
    pub image_poll_secs: u64,
    #[serde(default = "default_music_poll_secs")]
    pub music_poll_secs: u64,
    #[serde(default = "default_video_poll_secs")]
    pub video_poll_secs: u64,
    /// Upper bound on status polls before a job is declared failed.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

fn default_openart_base_url() -> String {
    "https://openart.ai/api".to_string()
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_runway_base_url() -> String {
    "https://api.dev.runwayml.com/v1".to_string()
}

fn default_jenai_base_url() -> String {
    "https://app.jenmusic.ai/api/v1/public".to_string()
}

fn default_image_poll_secs() -> u64 {
    2
}

fn default_music_poll_secs() -> u64 {
    5
}

fn default_video_poll_secs() -> u64 {
    10
}

fn default_max_polls() -> u32 {
    180
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openart_base_url: default_openart_base_url(),
            elevenlabs_base_url: default_elevenlabs_base_url(),
            runway_base_url: default_runway_base_url(),
            jenai_base_url: default_jenai_base_url(),
            image_poll_secs: default_image_poll_secs(),
            music_poll_secs: default_music_poll_secs(),
            video_poll_secs: default_video_poll_secs(),
            max_polls: default_max_polls(),
        }
    }
}

/// Where generated artifacts are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Directory (relative to the data dir) used by the filesystem backend.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
    /// Base URL under which filesystem blobs are served.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Filesystem
}

fn default_blob_dir() -> String {
    "blobs".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080/blobs".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            blob_dir: default_blob_dir(),
            public_base_url: default_public_base_url(),
            bucket: String::new(),
            region: default_region(),
        }
    }
}
