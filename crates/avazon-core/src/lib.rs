//! Business logic and port definitions for Avazon.
//!
//! This crate defines the capability traits (LLM, painter, voice, video,
//! music, blob storage) and repository traits that the infrastructure
//! layer implements, plus the services built on them: the avatar creation
//! session engine, the content pipelines and the prompt registry. It
//! depends only on `avazon-types`, never on `avazon-infra` or any
//! database/IO crate.

pub mod agent;
pub mod content;
pub mod generation;
pub mod llm;
pub mod prompt;
pub mod repository;
pub mod session;

#[cfg(test)]
pub mod testing;
