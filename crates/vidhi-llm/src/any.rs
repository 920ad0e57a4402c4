use crate::compatible::CompatibleProvider;
use crate::gemini::GeminiEmbedder;
#[cfg(any(test, feature = "mock"))]
use crate::mock::{MockEmbedder, MockProvider};
use crate::openai::OpenAiProvider;

use crate::provider::{EmbeddingProvider, LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given closure for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            AnyProvider::Compatible($p) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Same as `delegate_provider!` for the embedding side.
macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Gemini($p) => $expr,
            AnyEmbedder::OpenAi($p) => $expr,
            AnyEmbedder::Compatible($p) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

/// Chat model used to generate answers.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Compatible(CompatibleProvider),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| LlmProvider::name(p))
    }

    fn model(&self) -> &str {
        delegate_provider!(self, |p| LlmProvider::model(p))
    }
}

/// Embedding model shared by ingestion and retrieval.
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Gemini(GeminiEmbedder),
    OpenAi(OpenAiProvider),
    Compatible(CompatibleProvider),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockEmbedder),
}

impl EmbeddingProvider for AnyEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::LlmError> {
        delegate_embedder!(self, |p| p.embed_documents(texts).await)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        delegate_embedder!(self, |p| p.embed_query(text).await)
    }

    fn name(&self) -> &str {
        delegate_embedder!(self, |p| EmbeddingProvider::name(p))
    }

    fn model(&self) -> &str {
        delegate_embedder!(self, |p| EmbeddingProvider::model(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenerationParams;

    fn openai() -> OpenAiProvider {
        OpenAiProvider::new(
            "key".into(),
            "https://api.openai.com/v1",
            "gpt-4o-mini".into(),
            GenerationParams::default(),
        )
    }

    #[test]
    fn any_openai_name_and_model() {
        let provider = AnyProvider::OpenAi(openai());
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn any_compatible_name() {
        let provider = AnyProvider::Compatible(CompatibleProvider::new("groq".into(), openai()));
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn any_gemini_embedder_name() {
        let embedder = AnyEmbedder::Gemini(GeminiEmbedder::new("k".into(), "gemini-embedding-001"));
        assert_eq!(embedder.name(), "gemini");
        assert_eq!(embedder.model(), "models/gemini-embedding-001");
    }

    #[test]
    fn any_openai_embedder_model() {
        let embedder = AnyEmbedder::OpenAi(
            openai().with_embedding_model("text-embedding-3-large".into(), Some(3072)),
        );
        assert_eq!(embedder.model(), "text-embedding-3-large");
    }
}
