//! Retrieve, render, generate.

use vidhi_index::{MetadataFilter, RecordMetadata, Retriever};
use vidhi_llm::{AnyProvider, LlmProvider, Message};

use crate::error::AnswerError;
use crate::prompt;

/// Generated answer and the metadata of every chunk it was grounded on, in
/// retrieval order.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RecordMetadata>,
}

/// Stateless question answering over the legal index. Share as `Arc`.
pub struct AnswerService {
    retriever: Retriever,
    generator: AnyProvider,
    top_k: usize,
}

impl std::fmt::Debug for AnswerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerService")
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.name())
            .field("model", &self.generator.model())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl AnswerService {
    #[must_use]
    pub fn new(retriever: Retriever, generator: AnyProvider, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `query`, optionally restricting retrieval by chunk metadata.
    ///
    /// # Errors
    ///
    /// Returns `Retrieval` if embedding or search fails and `Generation` if
    /// the language model call fails.
    pub async fn answer(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Answer, AnswerError> {
        let chunks = self
            .retriever
            .relevant_documents(query, self.top_k, filter)
            .await?;
        let context = prompt::build_context(&chunks);
        let rendered = prompt::render(&context, query);

        tracing::debug!(
            chunks = chunks.len(),
            provider = self.generator.name(),
            model = self.generator.model(),
            "generating answer"
        );
        let text = self.generator.chat(&[Message::user(rendered)]).await?;

        Ok(Answer {
            text,
            sources: chunks.into_iter().map(|c| c.metadata).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use vidhi_index::{
        ChunkMetadata, CollectionSpec, DocumentChunk, InMemoryVectorStore, IngestionJob, Metric,
        VectorStore,
    };
    use vidhi_llm::AnyEmbedder;
    use vidhi_llm::mock::{MockEmbedder, MockProvider};

    use super::*;

    const DIM: usize = 256;

    fn corpus() -> Vec<DocumentChunk> {
        let chunk = |id: &str, text: &str, act: &str, section: &str| DocumentChunk {
            id: id.into(),
            text: text.into(),
            metadata: ChunkMetadata {
                act: Some(act.into()),
                section: Some(section.into()),
                ..ChunkMetadata::default()
            },
        };
        vec![
            chunk("ipc-378", "Section 378 defines theft of movable property.", "IPC", "378"),
            chunk("ipc-379", "Section 379 punishes theft with imprisonment.", "IPC", "379"),
            chunk("crpc-154", "Section 154 covers recording a first information report.", "CrPC", "154"),
        ]
    }

    async fn retriever() -> Retriever {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = MockEmbedder::new(DIM);
        IngestionJob::new(
            AnyEmbedder::Mock(embedder.clone()),
            Arc::clone(&store) as Arc<dyn VectorStore>,
            "legal-bot",
            CollectionSpec {
                dimension: DIM as u64,
                metric: Metric::Cosine,
            },
        )
        .ingest(&corpus())
        .await
        .unwrap();
        Retriever::new(AnyEmbedder::Mock(embedder), store, "legal-bot")
    }

    #[tokio::test]
    async fn answer_returns_generated_text_and_sources() {
        let generator = MockProvider::with_responses(vec!["**Offences Identified**: Section 378".into()]);
        let service = AnswerService::new(retriever().await, AnyProvider::Mock(generator), 2);

        let answer = service.answer("theft of property", None).await.unwrap();
        assert_eq!(answer.text, "**Offences Identified**: Section 378");
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources.iter().all(|s| !s.text.is_empty()));
    }

    #[tokio::test]
    async fn prompt_carries_retrieved_context_and_question() {
        let generator = MockProvider::default();
        let service = AnswerService::new(retriever().await, AnyProvider::Mock(generator.clone()), 1);

        let answer = service.answer("someone stole my bike, what is theft", None).await.unwrap();
        let calls = generator.recorded();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 1);
        let prompt = &calls[0][0].content;
        assert!(prompt.contains("someone stole my bike, what is theft"));
        assert!(prompt.contains(&answer.sources[0].text));
    }

    #[tokio::test]
    async fn sources_never_exceed_top_k() {
        for k in 0..=4 {
            let service =
                AnswerService::new(retriever().await, AnyProvider::Mock(MockProvider::default()), k);
            let answer = service.answer("section", None).await.unwrap();
            assert!(answer.sources.len() <= k);
        }
    }

    #[tokio::test]
    async fn filter_is_forwarded_to_retrieval() {
        let service =
            AnswerService::new(retriever().await, AnyProvider::Mock(MockProvider::default()), 2);
        let filter: MetadataFilter = serde_json::from_value(json!({"act": "CrPC"})).unwrap();

        let answer = service.answer("theft", Some(&filter)).await.unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].fields.act.as_deref(), Some("CrPC"));
    }

    #[tokio::test]
    async fn generation_failure_is_generation_error() {
        let service =
            AnswerService::new(retriever().await, AnyProvider::Mock(MockProvider::failing()), 2);
        let err = service.answer("theft", None).await.unwrap_err();
        assert!(matches!(err, AnswerError::Generation(_)));
    }

    #[tokio::test]
    async fn retrieval_failure_is_retrieval_error() {
        let retriever = Retriever::new(
            AnyEmbedder::Mock(MockEmbedder::new(DIM).failing_queries()),
            Arc::new(InMemoryVectorStore::new()),
            "legal-bot",
        );
        let generator = MockProvider::default();
        let service = AnswerService::new(retriever, AnyProvider::Mock(generator.clone()), 2);

        let err = service.answer("theft", None).await.unwrap_err();
        assert!(matches!(err, AnswerError::Retrieval(_)));
        assert!(generator.recorded().is_empty());
    }
}
