//! Semantic retrieval of legal text chunks.

use std::sync::Arc;

use vidhi_llm::{AnyEmbedder, EmbeddingProvider};

use crate::error::Result;
use crate::filter::MetadataFilter;
use crate::types::RecordMetadata;
use crate::vector_store::VectorStore;

pub const DEFAULT_TOP_K: usize = 2;

/// One search hit with its stored metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

impl RetrievedChunk {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.metadata.text
    }
}

/// Embeds a query and returns its nearest chunks from the index.
///
/// Must use the same embedding model as the ingestion run that built the
/// index.
#[derive(Clone)]
pub struct Retriever {
    embedder: AnyEmbedder,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &EmbeddingProvider::name(&self.embedder))
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    #[must_use]
    pub fn new(
        embedder: AnyEmbedder,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    /// Return at most `k` chunks in descending similarity order.
    ///
    /// # Errors
    ///
    /// Returns an error if query embedding or the index search fails.
    pub async fn relevant_documents(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(query).await?;
        let hits = self
            .store
            .search(
                &self.collection,
                vector,
                k as u64,
                filter.and_then(MetadataFilter::to_vector_filter),
            )
            .await?;

        let mut chunks = Vec::with_capacity(hits.len().min(k));
        for hit in hits {
            let payload = serde_json::Value::Object(hit.payload.into_iter().collect());
            match serde_json::from_value::<RecordMetadata>(payload) {
                Ok(metadata) => chunks.push(RetrievedChunk {
                    id: hit.id,
                    score: hit.score,
                    metadata,
                }),
                Err(e) => tracing::warn!(id = %hit.id, "skipping hit without usable text: {e}"),
            }
        }
        chunks.truncate(k);

        tracing::debug!(k, returned = chunks.len(), "retrieval finished");
        Ok(chunks)
    }
}
