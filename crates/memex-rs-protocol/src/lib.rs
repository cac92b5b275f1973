//! Platform contract types for Memex: adapters, turn context, and ids.

mod adapter;
mod platforms;

pub use adapter::{AdapterError, PlatformAdapter, PlatformKind, prefix_inject};
pub use platforms::{AnthropicAdapter, GeminiAdapter, GenericAdapter, OpenAiAdapter};

use serde::{Deserialize, Serialize};

/// Identifier of a conversation as reported by the platform.
pub type ConversationId = String;
/// Identifier of a single turn inside a conversation.
pub type TurnId = String;

/// Conversation coordinates attached to memories written during a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnContext {
    /// Conversation the turn belongs to.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    /// Turn identifier within the conversation.
    #[serde(default)]
    pub turn_id: Option<TurnId>,
}

impl TurnContext {
    /// Build a context for a known conversation and turn.
    pub fn new(conversation_id: impl Into<String>, turn_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            turn_id: Some(turn_id.into()),
        }
    }
}
