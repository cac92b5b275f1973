use async_trait::async_trait;
use memex_rs_memory::{Embedder, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedder returning canned vectors keyed by substring.
#[derive(Debug)]
pub struct FixedEmbedder {
    default: Vec<f32>,
    rules: Vec<(String, Vec<f32>)>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(default: Vec<f32>) -> Self {
        Self {
            default,
            rules: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Texts containing `needle` embed to `vector`; first match wins.
    pub fn with(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        self.rules.push((needle.into(), vector));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vector = self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, vector)| vector.clone())
            .unwrap_or_else(|| self.default.clone());
        Ok(vector)
    }
}

/// Embedder that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, MemoryError> {
        Err(MemoryError::Embedding("embedding service unavailable".to_string()))
    }
}
