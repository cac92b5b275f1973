use memex_rs_protocol::{AdapterError, GenericAdapter, PlatformAdapter};
use parking_lot::Mutex;
use serde_json::Value;

/// Generic adapter that records every context block it is asked to inject.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    inner: GenericAdapter,
    blocks: Mutex<Vec<String>>,
    fail_inject: bool,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter whose `inject_to_request` always fails.
    pub fn failing_inject() -> Self {
        Self {
            fail_inject: true,
            ..Self::default()
        }
    }

    /// Context blocks passed to `inject_to_request`, in call order.
    pub fn blocks(&self) -> Vec<String> {
        self.blocks.lock().clone()
    }
}

impl PlatformAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    fn parse_request(&self, request: &Value) -> Result<String, AdapterError> {
        self.inner.parse_request(request)
    }

    fn parse_response(&self, response: &Value) -> Result<String, AdapterError> {
        self.inner.parse_response(response)
    }

    fn inject_to_request(
        &self,
        request: Value,
        context_block: &str,
    ) -> Result<Value, AdapterError> {
        self.blocks.lock().push(context_block.to_string());
        if self.fail_inject {
            return Err(AdapterError::MalformedRequest {
                platform: self.name().to_string(),
                message: "injection disabled".to_string(),
            });
        }
        self.inner.inject_to_request(request, context_block)
    }
}
