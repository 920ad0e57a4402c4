//! Legal corpus ingestion and semantic retrieval.

pub mod corpus;
pub mod error;
pub mod filter;
pub mod in_memory_store;
pub mod ingest;
pub mod pinecone;
pub mod qdrant_ops;
pub mod retriever;
pub mod types;
pub mod vector_store;

pub use error::{IndexError, Result};
pub use filter::{FilterError, MetadataFilter};
pub use in_memory_store::InMemoryVectorStore;
pub use ingest::{IngestReport, IngestionJob};
pub use pinecone::{PineconeStore, ServerlessSpec};
pub use qdrant_ops::QdrantOps;
pub use retriever::{DEFAULT_TOP_K, RetrievedChunk, Retriever};
pub use types::{ChunkMetadata, DocumentChunk, RecordMetadata};
pub use vector_store::{
    CollectionSpec, ConditionKind, FieldCondition, FieldValue, Metric, RangeBounds,
    ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};
