//! Shared domain types for Avazon.
//!
//! This crate contains the domain types used across the Avazon backend:
//! creation sessions and their attempts, chat turns, tool-call arguments,
//! content creations, remixes, published avatars, the status state machines,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod avatar;
pub mod chat;
pub mod config;
pub mod content;
pub mod creation;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod remix;
pub mod status;
pub mod storage;
pub mod tool;
