//! Corpus ingestion: load → ensure index → embed in batches → upsert.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vidhi_llm::{AnyEmbedder, EmbeddingProvider};

use crate::corpus::load_corpus;
use crate::error::{IndexError, Result};
use crate::types::{DocumentChunk, RecordMetadata};
use crate::vector_store::{CollectionSpec, VectorPoint, VectorStore};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Summary of an ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub total: usize,
    pub upserted: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Populates a vector index from the preprocessed corpus.
pub struct IngestionJob {
    embedder: AnyEmbedder,
    store: Arc<dyn VectorStore>,
    collection: String,
    spec: CollectionSpec,
    batch_size: usize,
    ready_poll_interval: Duration,
}

impl IngestionJob {
    #[must_use]
    pub fn new(
        embedder: AnyEmbedder,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        spec: CollectionSpec,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            spec,
            batch_size: DEFAULT_BATCH_SIZE,
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    /// Load the corpus at `corpus_path` and ingest it.
    ///
    /// # Errors
    ///
    /// Returns an error if the corpus cannot be loaded or the index cannot be
    /// created. Per-batch failures are logged and counted, not returned.
    pub async fn run(&self, corpus_path: &Path) -> Result<IngestReport> {
        let chunks = load_corpus(corpus_path).await?;
        self.ingest(&chunks).await
    }

    /// Ingest already loaded chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the index existence check or creation fails.
    pub async fn ingest(&self, chunks: &[DocumentChunk]) -> Result<IngestReport> {
        self.ensure_index().await?;

        let mut report = IngestReport {
            total: chunks.len(),
            ..IngestReport::default()
        };
        let batch_count = chunks.len().div_ceil(self.batch_size);
        tracing::info!(
            chunks = chunks.len(),
            batches = batch_count,
            collection = %self.collection,
            "ingestion started"
        );

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            report.batches += 1;
            let batch_no = i + 1;
            match self.ingest_batch(batch).await {
                Ok(n) => {
                    report.upserted += n;
                    tracing::info!(
                        batch = batch_no,
                        progress = format_args!("{batch_no}/{batch_count}"),
                        upserted = n,
                    );
                }
                Err(e) => {
                    report.failed_batches += 1;
                    let written = e.records_written();
                    report.upserted += written;
                    tracing::error!(
                        batch = batch_no,
                        size = batch.len(),
                        written,
                        "batch failed: {e}"
                    );
                }
            }
        }

        tracing::info!(
            total = report.total,
            upserted = report.upserted,
            failed_batches = report.failed_batches,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ensure_index(&self) -> Result<()> {
        if self.store.collection_exists(&self.collection).await? {
            tracing::debug!(collection = %self.collection, "index already exists");
            return Ok(());
        }

        tracing::info!(
            collection = %self.collection,
            dimension = self.spec.dimension,
            metric = self.spec.metric.as_str(),
            "creating index"
        );
        self.store
            .create_collection(&self.collection, self.spec)
            .await?;

        while !self.store.collection_ready(&self.collection).await? {
            tracing::debug!(collection = %self.collection, "waiting for index to become ready");
            tokio::time::sleep(self.ready_poll_interval).await;
        }
        tracing::info!(collection = %self.collection, "index ready");
        Ok(())
    }

    async fn ingest_batch(&self, batch: &[DocumentChunk]) -> Result<usize> {
        let records = batch
            .iter()
            .map(index_record)
            .collect::<Result<Vec<_>>>()?;
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(IndexError::EmbeddingCount {
                expected: batch.len(),
                got: vectors.len(),
            });
        }
        if let Some(v) = vectors
            .iter()
            .find(|v| v.len() as u64 != self.spec.dimension)
        {
            return Err(IndexError::DimensionMismatch {
                expected: self.spec.dimension,
                got: v.len(),
            });
        }

        let points = batch
            .iter()
            .zip(records)
            .zip(vectors)
            .map(|((chunk, record), vector)| -> Result<VectorPoint> {
                Ok(VectorPoint {
                    id: chunk.id.clone(),
                    vector,
                    payload: record.into_payload()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.store.upsert(&self.collection, points).await?;
        Ok(batch.len())
    }
}

/// Index metadata for one chunk, rejecting records no backend can store.
fn index_record(chunk: &DocumentChunk) -> Result<RecordMetadata> {
    if chunk.id.trim().is_empty() {
        return Err(IndexError::InvalidRecord {
            id: chunk.id.clone(),
            reason: "empty id".into(),
        });
    }
    let mut record = RecordMetadata::from_chunk(chunk);
    record
        .fields
        .normalize()
        .map_err(|(field, reason)| IndexError::InvalidRecord {
            id: chunk.id.clone(),
            reason: format!("metadata field {field}: {reason}"),
        })?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use vidhi_llm::mock::MockEmbedder;

    use super::*;
    use crate::in_memory_store::InMemoryVectorStore;
    use crate::vector_store::{
        BoxFuture, Metric, ScoredVectorPoint, VectorFilter, VectorStoreError,
    };

    const DIM: usize = 32;

    fn spec() -> CollectionSpec {
        CollectionSpec {
            dimension: DIM as u64,
            metric: Metric::Cosine,
        }
    }

    fn chunks(n: usize) -> Vec<DocumentChunk> {
        (0..n)
            .map(|i| DocumentChunk {
                id: format!("chunk-{i}"),
                text: format!("Section {i} of the Indian Penal Code"),
                metadata: crate::types::ChunkMetadata {
                    act: Some("IPC".into()),
                    ..Default::default()
                },
            })
            .collect()
    }

    fn job(embedder: MockEmbedder, store: Arc<InMemoryVectorStore>) -> IngestionJob {
        IngestionJob::new(AnyEmbedder::Mock(embedder), store, "legal-bot", spec())
            .with_ready_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn creates_index_and_waits_for_readiness() {
        let store = Arc::new(InMemoryVectorStore::new().with_warmup_polls(3));
        let report = job(MockEmbedder::new(DIM), Arc::clone(&store))
            .ingest(&chunks(3))
            .await
            .unwrap();
        assert_eq!(report.upserted, 3);
        assert_eq!(store.len("legal-bot"), Some(3));
    }

    #[tokio::test]
    async fn splits_into_batches() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = MockEmbedder::new(DIM);
        let report = job(embedder.clone(), Arc::clone(&store))
            .with_batch_size(100)
            .ingest(&chunks(250))
            .await
            .unwrap();
        assert_eq!(
            report,
            IngestReport {
                total: 250,
                upserted: 250,
                batches: 3,
                failed_batches: 0,
            }
        );
        assert_eq!(embedder.document_calls(), 3);
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_later_batches() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = job(MockEmbedder::new(DIM).failing_on([1]), Arc::clone(&store))
            .with_batch_size(2)
            .ingest(&chunks(5))
            .await
            .unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.upserted, 3);
        assert_eq!(store.len("legal-bot"), Some(3));
    }

    #[tokio::test]
    async fn unstorable_record_fails_only_its_batch() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = MockEmbedder::new(DIM);
        let mut corpus = chunks(4);
        let mut bad = chunks(1).remove(0);
        bad.id = "bad".into();
        bad.metadata
            .extra
            .insert("origin".into(), serde_json::json!({"page": 1}));
        corpus.insert(2, bad);

        let report = job(embedder.clone(), Arc::clone(&store))
            .with_batch_size(2)
            .ingest(&corpus)
            .await
            .unwrap();
        assert_eq!(
            report,
            IngestReport {
                total: 5,
                upserted: 3,
                batches: 3,
                failed_batches: 1,
            }
        );
        assert_eq!(store.len("legal-bot"), Some(3));
        assert_eq!(embedder.document_calls(), 2);
    }

    #[tokio::test]
    async fn run_skips_the_batch_with_an_empty_id() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[
                {"id": "ipc-378", "text": "Section 378 defines theft."},
                {"id": "", "text": "orphan"},
                {"id": "ipc-379", "text": "Section 379 punishes theft."}
            ]"#,
        )
        .unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let report = job(MockEmbedder::new(DIM), Arc::clone(&store))
            .with_batch_size(1)
            .run(file.path())
            .await
            .unwrap();
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.upserted, 2);
        assert_eq!(store.len("legal-bot"), Some(2));
    }

    /// Stores the first half of every upsert, then fails.
    struct HalfWritingStore(InMemoryVectorStore);

    impl VectorStore for HalfWritingStore {
        fn collection_exists(&self, c: &str) -> BoxFuture<'_, std::result::Result<bool, VectorStoreError>> {
            self.0.collection_exists(c)
        }

        fn create_collection(
            &self,
            c: &str,
            spec: CollectionSpec,
        ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
            self.0.create_collection(c, spec)
        }

        fn collection_ready(&self, c: &str) -> BoxFuture<'_, std::result::Result<bool, VectorStoreError>> {
            self.0.collection_ready(c)
        }

        fn upsert(
            &self,
            c: &str,
            mut points: Vec<VectorPoint>,
        ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
            let c = c.to_owned();
            Box::pin(async move {
                points.truncate(points.len() / 2);
                let written = points.len();
                self.0.upsert(&c, points).await?;
                Err(VectorStoreError::PartialUpsert {
                    written,
                    reason: "connection reset".into(),
                })
            })
        }

        fn search(
            &self,
            c: &str,
            vector: Vec<f32>,
            limit: u64,
            filter: Option<VectorFilter>,
        ) -> BoxFuture<'_, std::result::Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
            self.0.search(c, vector, limit, filter)
        }
    }

    #[tokio::test]
    async fn partially_written_batch_counts_stored_records() {
        let store = Arc::new(HalfWritingStore(InMemoryVectorStore::new()));
        let report = IngestionJob::new(
            AnyEmbedder::Mock(MockEmbedder::new(DIM)),
            Arc::clone(&store) as Arc<dyn VectorStore>,
            "legal-bot",
            spec(),
        )
        .with_batch_size(4)
        .ingest(&chunks(8))
        .await
        .unwrap();
        assert_eq!(report.failed_batches, 2);
        assert_eq!(report.upserted, 4);
        assert_eq!(store.0.len("legal-bot"), Some(4));
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_the_batch() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = job(MockEmbedder::new(DIM + 1), Arc::clone(&store))
            .ingest(&chunks(2))
            .await
            .unwrap();
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.upserted, 0);
    }

    #[tokio::test]
    async fn reingest_is_idempotent() {
        let store = Arc::new(InMemoryVectorStore::new());
        let j = job(MockEmbedder::new(DIM), Arc::clone(&store));
        j.ingest(&chunks(4)).await.unwrap();
        j.ingest(&chunks(4)).await.unwrap();
        assert_eq!(store.len("legal-bot"), Some(4));
    }

    #[tokio::test]
    async fn stored_metadata_carries_embedded_text() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = MockEmbedder::new(DIM);
        job(embedder.clone(), Arc::clone(&store))
            .ingest(&chunks(1))
            .await
            .unwrap();
        let hits = store
            .search("legal-bot", embedder.vector_for("Section 0 of the Indian Penal Code"), 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].payload["text"], "Section 0 of the Indian Penal Code");
        assert_eq!(hits[0].payload["act"], "IPC");
    }

    #[tokio::test]
    async fn run_reports_missing_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryVectorStore::new());
        let err = job(MockEmbedder::new(DIM), store)
            .run(&dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DataNotFound(_)));
    }

    #[tokio::test]
    async fn empty_corpus_still_creates_index() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = job(MockEmbedder::new(DIM), Arc::clone(&store))
            .ingest(&[])
            .await
            .unwrap();
        assert_eq!(report, IngestReport::default());
        assert_eq!(store.len("legal-bot"), Some(0));
    }
}
