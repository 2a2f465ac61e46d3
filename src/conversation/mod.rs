//! Append-only conversation transcript owned by one orchestration loop.

use crate::error::{Result, TagloopError};
use crate::types::{Message, Role};

/// Ordered, append-only sequence of messages.
///
/// A system message, if present, sits at index 0 and is never duplicated.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Seed the system prompt. No-op once any message exists.
    pub fn seed(&mut self, system_prompt: impl Into<String>) {
        if self.messages.is_empty() {
            self.messages.push(Message::system(system_prompt));
        }
    }

    /// Append a message. A system message is only accepted as the first entry.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if message.is_system() && !self.messages.is_empty() {
            return Err(TagloopError::InvalidState(
                "system message must be the first message".into(),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn find_by_tool_call_id(&self, id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some(id))
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Number of messages with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}
