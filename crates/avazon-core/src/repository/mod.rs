//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (avazon-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod avatar;
pub mod content;
pub mod creation;
pub mod prompt;
pub mod remix;
