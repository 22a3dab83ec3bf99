//! Conversational sub-agents.
//!
//! - `SubAgent`: history + tools + streamed, cancellable exchanges
//! - `separate_text_and_json`: splits a tool-calling reply into narration
//!   and argument objects

pub mod split;
pub mod sub_agent;

pub use split::separate_text_and_json;
pub use sub_agent::{AgentExchange, AgentOutput, AgentReply, AgentTurn, SubAgent};
