use serde_json::Value;
use thiserror::Error;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Human/user turn.
    User,
    /// Model turn.
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One unit of message content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain text.
    Text(String),
    /// Structured tool invocation emitted by the model.
    ToolUse(ToolUse),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::ToolUse(_) => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            Self::ToolUse(tool_use) => Some(tool_use),
            Self::Text(_) => None,
        }
    }
}

/// Tool call emitted by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    /// Provider-generated call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Decoded arguments payload.
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("chat message content must contain at least one block")]
    EmptyContent,
}

/// A role-tagged message with at least one content block.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    role: Role,
    content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Result<Self, MessageError> {
        if content.is_empty() {
            return Err(MessageError::EmptyContent);
        }
        Ok(Self { role, content })
    }

    /// Builds a single-block user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Builds a single-block assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    /// Text blocks joined without separator.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }
}

/// Append-only message history for one chat session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_content_is_rejected() {
        assert_eq!(
            ChatMessage::new(Role::User, Vec::new()),
            Err(MessageError::EmptyContent)
        );
    }

    #[test]
    fn text_skips_tool_blocks() {
        let message = ChatMessage::new(
            Role::Assistant,
            vec![
                ContentBlock::text("a"),
                ContentBlock::ToolUse(ToolUse {
                    id: "t1".to_string(),
                    name: "noop".to_string(),
                    input: json!({}),
                }),
                ContentBlock::text("b"),
            ],
        )
        .expect("content is not empty");
        assert_eq!(message.text(), "ab");
    }

    #[test]
    fn conversation_keeps_insertion_order() {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::user("hi"));
        conversation.push(ChatMessage::assistant("hello"));

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].role(), Role::User);
        assert_eq!(conversation.messages()[1].role(), Role::Assistant);
    }
}
