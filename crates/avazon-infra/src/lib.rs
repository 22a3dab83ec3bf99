//! Infrastructure layer for Avazon.
//!
//! Contains implementations of the traits defined in `avazon-core`:
//! SQLite repositories, the OpenAI-compatible LLM client, the OpenArt,
//! ElevenLabs, Runway and JENAI generation providers, filesystem and S3 blob
//! stores, plus configuration loading and access-token signing.

pub mod blob;
pub mod config;
pub mod crypto;
pub mod llm;
pub mod providers;
pub mod sqlite;
