//! Chat message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message in the chat widget's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Position in the conversation, starting at 1.
    pub id: u64,
    /// Message text.
    pub text: String,
    /// True for assistant and system-generated messages.
    pub from_assistant: bool,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message with the current timestamp.
    #[must_use]
    pub fn new(id: u64, text: impl Into<String>, from_assistant: bool) -> Self {
        Self {
            id,
            text: text.into(),
            from_assistant,
            timestamp: Utc::now(),
        }
    }
}
