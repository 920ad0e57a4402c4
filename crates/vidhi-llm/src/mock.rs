//! Test-only mock providers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::provider::{EmbeddingProvider, LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    recorded: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub fail_chat: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            recorded: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            fail_chat: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Every message list passed to `chat`, oldest first. Shared between clones.
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    #[must_use]
    pub fn recorded(&self) -> Vec<Vec<Message>> {
        self.recorded.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        self.recorded.lock().unwrap().push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn model(&self) -> &str {
        "mock-model"
    }
}

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dimensions`
/// buckets, so texts sharing words land close together under cosine
/// similarity. `embed_documents` calls are counted from zero; calls listed
/// in `fail_on_calls` return an error.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    calls: Arc<AtomicUsize>,
    fail_on_calls: Arc<HashSet<usize>>,
    pub fail_queries: bool,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on_calls: Arc::new(HashSet::new()),
            fail_queries: false,
        }
    }

    #[must_use]
    pub fn failing_on(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
        self.fail_on_calls = Arc::new(calls.into_iter().collect());
        self
    }

    #[must_use]
    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    #[must_use]
    pub fn document_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.dimensions.max(1)];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) % v.len() as u64;
            #[allow(clippy::cast_possible_truncation)]
            {
                v[bucket as usize] += 1.0;
            }
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_calls.contains(&call) {
            return Err(crate::LlmError::Other(format!("mock embedding failure on call {call}")));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        if self.fail_queries {
            return Err(crate::LlmError::Other("mock query embedding failure".into()));
        }
        Ok(self.vector_for(text))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn model(&self) -> &str {
        "mock-embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let p = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        assert_eq!(p.chat(&[]).await.unwrap(), "one");
        assert_eq!(p.chat(&[]).await.unwrap(), "two");
        assert_eq!(p.chat(&[]).await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn recorded_messages_are_shared_between_clones() {
        let p = MockProvider::default();
        let clone = p.clone();
        clone.chat(&[Message::user("hello")]).await.unwrap();
        assert_eq!(p.recorded().len(), 1);
        assert_eq!(p.recorded()[0][0].content, "hello");
    }

    #[test]
    fn shared_words_produce_shared_buckets() {
        let e = MockEmbedder::new(64);
        assert_eq!(e.vector_for("Theft IPC"), e.vector_for("theft ipc"));
        assert_eq!(e.vector_for("anything").len(), 64);
    }

    #[tokio::test]
    async fn failing_calls_are_indexed_from_zero() {
        let e = MockEmbedder::new(8).failing_on([1]);
        assert!(e.embed_documents(&["a".into()]).await.is_ok());
        assert!(e.embed_documents(&["a".into()]).await.is_err());
        assert!(e.embed_documents(&["a".into()]).await.is_ok());
        assert_eq!(e.document_calls(), 3);
    }
}
