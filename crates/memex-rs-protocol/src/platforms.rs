//! Adapter variants for the supported chat platforms.

use crate::adapter::{AdapterError, PlatformAdapter};
use serde_json::Value;

/// Plain-text or loosely keyed JSON payloads (CLI, MCP, editor integrations).
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericAdapter;

/// OpenAI chat completions and responses payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

/// Anthropic messages payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

/// Gemini `generateContent` payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

const GENERIC_REQUEST_KEYS: [&str; 4] = ["prompt", "input", "text", "message"];
const GENERIC_RESPONSE_KEYS: [&str; 4] = ["text", "content", "output", "response"];

impl PlatformAdapter for GenericAdapter {
    fn name(&self) -> &str {
        "generic"
    }

    fn parse_request(&self, request: &Value) -> Result<String, AdapterError> {
        keyed_text(request, &GENERIC_REQUEST_KEYS)
            .ok_or_else(|| malformed_request(self.name(), "expected string or prompt field"))
    }

    fn parse_response(&self, response: &Value) -> Result<String, AdapterError> {
        keyed_text(response, &GENERIC_RESPONSE_KEYS)
            .ok_or_else(|| malformed_response(self.name(), "expected string or text field"))
    }

    fn inject_to_request(
        &self,
        request: Value,
        context_block: &str,
    ) -> Result<Value, AdapterError> {
        match request {
            Value::String(input) => Ok(Value::String(self.inject(&input, context_block))),
            Value::Object(mut map) => {
                let Some(key) = GENERIC_REQUEST_KEYS
                    .iter()
                    .find(|key| map.get(**key).is_some_and(Value::is_string))
                else {
                    return Err(malformed_request(self.name(), "no prompt field to inject"));
                };
                let input = map
                    .get(*key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                map.insert(
                    (*key).to_string(),
                    Value::String(self.inject(&input, context_block)),
                );
                Ok(Value::Object(map))
            }
            _ => Err(malformed_request(self.name(), "expected string or object")),
        }
    }
}

impl PlatformAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn parse_request(&self, request: &Value) -> Result<String, AdapterError> {
        if let Some(input) = request.get("input").and_then(Value::as_str) {
            return Ok(input.to_string());
        }
        last_user_message(request, "messages")
            .and_then(|message| content_text(message.get("content")?))
            .ok_or_else(|| malformed_request(self.name(), "no user message"))
    }

    fn parse_response(&self, response: &Value) -> Result<String, AdapterError> {
        if let Some(text) = response.get("output_text").and_then(Value::as_str) {
            return Ok(text.to_string());
        }
        response
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| content_text(message.get("content")?))
            .ok_or_else(|| malformed_response(self.name(), "no choices[0].message.content"))
    }

    fn inject_to_request(
        &self,
        mut request: Value,
        context_block: &str,
    ) -> Result<Value, AdapterError> {
        if let Some(input) = request.get("input").and_then(Value::as_str) {
            let injected = self.inject(input, context_block);
            request["input"] = Value::String(injected);
            return Ok(request);
        }
        let message = last_user_message_mut(&mut request, "messages")
            .ok_or_else(|| malformed_request(self.name(), "no user message"))?;
        inject_content(self, message, "content", context_block)
            .ok_or_else(|| malformed_request(self.name(), "unsupported content shape"))?;
        Ok(request)
    }
}

impl PlatformAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn parse_request(&self, request: &Value) -> Result<String, AdapterError> {
        last_user_message(request, "messages")
            .and_then(|message| content_text(message.get("content")?))
            .ok_or_else(|| malformed_request(self.name(), "no user message"))
    }

    fn parse_response(&self, response: &Value) -> Result<String, AdapterError> {
        response
            .get("content")
            .and_then(content_text)
            .ok_or_else(|| malformed_response(self.name(), "no text content blocks"))
    }

    fn inject_to_request(
        &self,
        mut request: Value,
        context_block: &str,
    ) -> Result<Value, AdapterError> {
        let message = last_user_message_mut(&mut request, "messages")
            .ok_or_else(|| malformed_request(self.name(), "no user message"))?;
        inject_content(self, message, "content", context_block)
            .ok_or_else(|| malformed_request(self.name(), "unsupported content shape"))?;
        Ok(request)
    }
}

impl PlatformAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn parse_request(&self, request: &Value) -> Result<String, AdapterError> {
        last_user_message(request, "contents")
            .and_then(|content| content_text(content.get("parts")?))
            .ok_or_else(|| malformed_request(self.name(), "no user contents"))
    }

    fn parse_response(&self, response: &Value) -> Result<String, AdapterError> {
        response
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content_text(content.get("parts")?))
            .ok_or_else(|| malformed_response(self.name(), "no candidates[0].content.parts"))
    }

    fn inject_to_request(
        &self,
        mut request: Value,
        context_block: &str,
    ) -> Result<Value, AdapterError> {
        let content = last_user_message_mut(&mut request, "contents")
            .ok_or_else(|| malformed_request(self.name(), "no user contents"))?;
        inject_content(self, content, "parts", context_block)
            .ok_or_else(|| malformed_request(self.name(), "unsupported parts shape"))?;
        Ok(request)
    }
}

/// Read a string payload or the first string field among `keys`.
fn keyed_text(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Flatten a content value: a string, or an array of `{text}` parts.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts = parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(_) => part.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn is_user(message: &Value) -> bool {
    message
        .get("role")
        .and_then(Value::as_str)
        .is_none_or(|role| role == "user")
}

fn last_user_message<'a>(request: &'a Value, key: &str) -> Option<&'a Value> {
    request
        .get(key)
        .and_then(Value::as_array)?
        .iter()
        .rev()
        .find(|message| is_user(message))
}

fn last_user_message_mut<'a>(request: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    request
        .get_mut(key)
        .and_then(Value::as_array_mut)?
        .iter_mut()
        .rev()
        .find(|message| is_user(message))
}

/// Rewrite the first text slot of `message[field]` with the injected input.
fn inject_content(
    adapter: &dyn PlatformAdapter,
    message: &mut Value,
    field: &str,
    context_block: &str,
) -> Option<()> {
    let content = message.get_mut(field)?;
    match content {
        Value::String(text) => {
            *text = adapter.inject(text, context_block);
            Some(())
        }
        Value::Array(parts) => {
            let part = parts
                .iter_mut()
                .find(|part| part.get("text").is_some_and(Value::is_string))?;
            let text = part.get("text").and_then(Value::as_str)?.to_string();
            part["text"] = Value::String(adapter.inject(&text, context_block));
            Some(())
        }
        _ => None,
    }
}

fn malformed_request(platform: &str, message: &str) -> AdapterError {
    AdapterError::MalformedRequest {
        platform: platform.to_string(),
        message: message.to_string(),
    }
}

fn malformed_response(platform: &str, message: &str) -> AdapterError {
    AdapterError::MalformedResponse {
        platform: platform.to_string(),
        message: message.to_string(),
    }
}
