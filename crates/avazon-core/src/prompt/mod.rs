//! System prompt registry.
//!
//! - `PromptRegistry`: lookup and one-shot completion port
//! - `BoxPromptRegistry`: object-safe wrapper shared by services
//! - `PromptService`: repository-backed implementation plus administration
//! - `defaults`: built-in prompts used when nothing is assigned

pub mod defaults;
pub mod registry;
pub mod service;

pub use registry::{BoxPromptRegistry, PromptRegistry};
pub use service::PromptService;
