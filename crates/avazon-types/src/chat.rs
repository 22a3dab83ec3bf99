//! Persisted chat turns of a creation session.
//!
//! Every turn belongs to one object type and to one generation attempt via
//! `created_object_number`, which is the join key between a transcript and
//! the attempt it led to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::creation::ObjectType;
use crate::llm::{Message, ToolInvocation};

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

/// A single chat turn within a creation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationChat {
    pub id: Uuid,
    pub creation_id: Uuid,
    pub object_type: ObjectType,
    pub role: MessageRole,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub tool_call_name: Option<String>,
    pub tool_call_args: Option<String>,
    pub created_object_number: u32,
    pub created_at: DateTime<Utc>,
}

impl CreationChat {
    pub fn new(
        creation_id: Uuid,
        object_type: ObjectType,
        role: MessageRole,
        content: impl Into<String>,
        created_object_number: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            creation_id,
            object_type,
            role,
            content: content.into(),
            tool_call_id: None,
            tool_call_name: None,
            tool_call_args: None,
            created_object_number,
            created_at: Utc::now(),
        }
    }

    pub fn with_tool_call(mut self, invocation: &ToolInvocation) -> Self {
        self.tool_call_id = Some(invocation.id.clone());
        self.tool_call_name = Some(invocation.name.clone());
        self.tool_call_args = Some(invocation.arguments.clone());
        self
    }

    /// Convert a persisted turn back into conversation history.
    ///
    /// Assistant turns that carry a function name become tool requests;
    /// tool turns answer the recorded call id.
    pub fn to_message(&self) -> Message {
        match (self.role, &self.tool_call_id, &self.tool_call_name) {
            (MessageRole::Assistant, Some(id), Some(name)) => Message::tool_request(
                self.content.clone(),
                ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: self.tool_call_args.clone().unwrap_or_default(),
                },
            ),
            (MessageRole::Tool, Some(id), _) => Message::tool_result(self.content.clone(), id.clone()),
            (role, _, _) => Message::new(role, self.content.clone()),
        }
    }
}

/// Render a transcript as plain `role: content` lines for a one-shot prompt.
pub fn transcript(chats: &[CreationChat]) -> String {
    chats
        .iter()
        .filter(|c| matches!(c.role, MessageRole::User | MessageRole::Assistant))
        .filter(|c| !c.content.trim().is_empty())
        .map(|c| format!("{}: {}", c.role, c.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_turns_restore_as_tool_messages() {
        let creation_id = Uuid::now_v7();
        let invocation = ToolInvocation {
            id: "call_9".to_string(),
            name: "create_avatar_image".to_string(),
            arguments: r#"{"summary":"fox"}"#.to_string(),
        };
        let request = CreationChat::new(
            creation_id,
            ObjectType::Image,
            MessageRole::Assistant,
            "creation started",
            0,
        )
        .with_tool_call(&invocation);
        let result = CreationChat::new(
            creation_id,
            ObjectType::Image,
            MessageRole::Tool,
            "creation started",
            0,
        )
        .with_tool_call(&invocation);

        assert_eq!(request.to_message().tool_calls, vec![invocation]);
        assert_eq!(
            result.to_message().tool_call_id.as_deref(),
            Some("call_9")
        );
    }

    #[test]
    fn transcript_skips_tool_and_empty_turns() {
        let id = Uuid::now_v7();
        let chats = vec![
            CreationChat::new(id, ObjectType::Voice, MessageRole::User, "deeper please", 1),
            CreationChat::new(id, ObjectType::Voice, MessageRole::Tool, "creation started", 1),
            CreationChat::new(id, ObjectType::Voice, MessageRole::Assistant, "", 1),
            CreationChat::new(id, ObjectType::Voice, MessageRole::Assistant, "Sure!", 1),
        ];
        assert_eq!(transcript(&chats), "user: deeper please\nassistant: Sure!");
    }
}
