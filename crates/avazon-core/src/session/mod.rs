//! Avatar creation session engine.
//!
//! - `AvatarCreationService`: start / enter / create / confirm / publish
//! - `SessionRegistry`: live sessions by id, idle sweep
//! - `CreationSession`: one live session, three object actors
//! - `SessionEvent`: frames streamed back to the client

mod actor;
pub mod events;
pub mod handle;
mod jobs;
pub mod registry;
pub mod service;
pub mod state;

pub use events::{EventScope, SessionEvent, SessionEventKind};
pub use handle::{CreationSession, SessionDeps};
pub use registry::SessionRegistry;
pub use service::AvatarCreationService;
