use crate::error::LlmError;
use crate::openai::OpenAiProvider;
use crate::provider::{EmbeddingProvider, LlmProvider, Message};

/// An OpenAI-compatible endpoint (Groq, Together, a local vLLM) under its own name.
#[derive(Debug, Clone)]
pub struct CompatibleProvider {
    provider_name: String,
    inner: OpenAiProvider,
}

impl CompatibleProvider {
    #[must_use]
    pub fn new(provider_name: String, inner: OpenAiProvider) -> Self {
        Self {
            provider_name,
            inner,
        }
    }
}

impl LlmProvider for CompatibleProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.inner.chat_as(&self.provider_name, messages).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        LlmProvider::model(&self.inner)
    }
}

impl EmbeddingProvider for CompatibleProvider {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.inner.embed_as(&self.provider_name, texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.inner
            .embed_as(&self.provider_name, &[text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        self.inner.embedding_model()
    }
}
