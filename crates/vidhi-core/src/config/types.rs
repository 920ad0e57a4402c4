use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vidhi_index::Metric;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Shown in the root status message.
    #[serde(default = "default_service_name")]
    pub name: String,
}

fn default_service_name() -> String {
    "Legal GPT Backend".into()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Gemini,
    OpenAi,
    Compatible,
}

impl EmbeddingProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Compatible => "compatible",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    /// Display name for a `compatible` provider.
    #[serde(default = "default_embedding_name")]
    pub name: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector length requested from the model; must match the index.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Required for `openai` and `compatible`; Gemini uses its public endpoint
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_name() -> String {
    "gemini".into()
}

fn default_embedding_model() -> String {
    vidhi_llm::gemini::DEFAULT_MODEL.into()
}

fn default_embedding_dimensions() -> usize {
    3072
}

fn default_embedding_key_env() -> String {
    "GOOGLE_API_KEY".into()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            name: default_embedding_name(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: None,
            api_key_env: default_embedding_key_env(),
            max_retries: default_max_retries(),
        }
    }
}

/// Vector index backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Pinecone,
    Qdrant,
    /// Process-local store; contents are lost on exit.
    Memory,
}

impl IndexBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pinecone => "pinecone",
            Self::Qdrant => "qdrant",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    /// Index (Pinecone) or collection (Qdrant) name.
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the Pinecone control plane URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_url: Option<String>,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_index_key_env")]
    pub api_key_env: String,
    /// Optional for Qdrant; unset or empty means no authentication.
    #[serde(default = "default_qdrant_key_env")]
    pub qdrant_api_key_env: String,
}

fn default_index_name() -> String {
    "legal-bot".into()
}

fn default_cloud() -> String {
    "aws".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_index_key_env() -> String {
    "PINECONE_API_KEY".into()
}

fn default_qdrant_key_env() -> String {
    "QDRANT_API_KEY".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            name: default_index_name(),
            metric: Metric::default(),
            cloud: default_cloud(),
            region: default_region(),
            control_url: None,
            qdrant_url: default_qdrant_url(),
            api_key_env: default_index_key_env(),
            qdrant_api_key_env: default_qdrant_key_env(),
        }
    }
}

/// Chat backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    OpenAi,
    #[default]
    Compatible,
}

impl GenerationProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Compatible => "compatible",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: GenerationProviderKind,
    /// Display name for a `compatible` provider.
    #[serde(default = "default_llm_name")]
    pub name: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_llm_name() -> String {
    "groq".into()
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".into()
}

fn default_llm_max_tokens() -> u32 {
    2048
}

fn default_llm_key_env() -> String {
    "GROQ_API_KEY".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::default(),
            name: default_llm_name(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: default_llm_max_tokens(),
            api_key_env: default_llm_key_env(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    vidhi_index::DEFAULT_TOP_K
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/processed_legal_data.json")
}

fn default_batch_size() -> usize {
    vidhi_index::ingest::DEFAULT_BATCH_SIZE
}

fn default_ready_poll_interval_ms() -> u64 {
    1000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            batch_size: default_batch_size(),
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_bind() -> String {
    "0.0.0.0".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_max_body() -> usize {
    1_048_576
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

/// Backoff for background construction of the answer service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InitConfig {
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

fn default_retry_initial_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    30_000
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_index_timeout")]
    pub index_seconds: u64,
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_index_timeout() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_seconds: default_embedding_timeout(),
            llm_seconds: default_llm_timeout(),
            index_seconds: default_index_timeout(),
        }
    }
}
