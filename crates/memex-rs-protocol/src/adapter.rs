//! Platform adapter capability interface and variant selection.

use crate::platforms::{AnthropicAdapter, GeminiAdapter, GenericAdapter, OpenAiAdapter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Errors raised when a request or response does not have the expected shape.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Request payload could not be interpreted.
    #[error("malformed request for {platform}: {message}")]
    MalformedRequest { platform: String, message: String },
    /// Response payload could not be interpreted.
    #[error("malformed response for {platform}: {message}")]
    MalformedResponse { platform: String, message: String },
}

/// Capability interface every platform variant implements.
///
/// The engine only ever calls these operations. They are synchronous and
/// total on well-formed payloads.
pub trait PlatformAdapter: Send + Sync {
    /// Stable platform name.
    fn name(&self) -> &str;

    /// Extract the user-facing input text from an outbound request.
    fn parse_request(&self, request: &Value) -> Result<String, AdapterError>;

    /// Extract the model output text from a platform response.
    fn parse_response(&self, response: &Value) -> Result<String, AdapterError>;

    /// Place a rendered context block relative to user input.
    fn inject(&self, input: &str, context_block: &str) -> String {
        prefix_inject(input, context_block)
    }

    /// Rewrite a request so its user input carries the context block.
    fn inject_to_request(&self, request: Value, context_block: &str)
    -> Result<Value, AdapterError>;
}

/// Default placement: context block first, user input after a blank line.
pub fn prefix_inject(input: &str, context_block: &str) -> String {
    if context_block.trim().is_empty() {
        return input.to_string();
    }
    format!("{context_block}\n\n{input}")
}

/// Closed set of supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Generic,
    OpenAi,
    Anthropic,
    Gemini,
}

impl PlatformKind {
    /// Resolve a platform name (or a common alias) to its variant.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "generic" | "cli" | "mcp" | "vscode" => Some(Self::Generic),
            "openai" | "chatgpt" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Canonical platform name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Instantiate the adapter for this variant.
    pub fn adapter(self) -> Arc<dyn PlatformAdapter> {
        match self {
            Self::Generic => Arc::new(GenericAdapter),
            Self::OpenAi => Arc::new(OpenAiAdapter),
            Self::Anthropic => Arc::new(AnthropicAdapter),
            Self::Gemini => Arc::new(GeminiAdapter),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
