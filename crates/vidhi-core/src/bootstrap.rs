//! Construction of providers, index clients and the answer service from
//! [`Config`] and a [`VaultProvider`].
//!
//! Every builder resolves its credential through the vault when called, so a
//! key exported after a failed attempt is picked up by the next one.

use std::sync::Arc;
use std::time::Duration;

use vidhi_index::{
    CollectionSpec, InMemoryVectorStore, IngestionJob, PineconeStore, QdrantOps, Retriever,
    ServerlessSpec, VectorStore,
};
use vidhi_llm::compatible::CompatibleProvider;
use vidhi_llm::gemini::GeminiEmbedder;
use vidhi_llm::http::client_with_timeout;
use vidhi_llm::openai::OpenAiProvider;
use vidhi_llm::{AnyEmbedder, AnyProvider, GenerationParams};

use crate::answer::AnswerService;
use crate::config::{Config, EmbeddingProviderKind, GenerationProviderKind, IndexBackend};
use crate::error::ConfigError;
use crate::vault::{VaultProvider, require_secret};

#[must_use]
pub fn collection_spec(config: &Config) -> CollectionSpec {
    CollectionSpec {
        dimension: config.embedding.dimensions as u64,
        metric: config.index.metric,
    }
}

/// # Errors
///
/// Returns `MissingCredential` if the embedding API key is not in the vault.
pub async fn build_embedder(
    config: &Config,
    vault: &dyn VaultProvider,
) -> Result<AnyEmbedder, ConfigError> {
    let cfg = &config.embedding;
    let key = require_secret(vault, &cfg.api_key_env).await?;
    let timeout = Duration::from_secs(config.timeouts.embedding_seconds);

    let embedder = match cfg.provider {
        EmbeddingProviderKind::Gemini => {
            let mut gemini = GeminiEmbedder::new(key.expose().to_owned(), &cfg.model)
                .with_dimensions(cfg.dimensions)
                .with_client(client_with_timeout(timeout))
                .with_max_retries(cfg.max_retries);
            if let Some(url) = &cfg.base_url {
                gemini = gemini.with_base_url(url);
            }
            AnyEmbedder::Gemini(gemini)
        }
        EmbeddingProviderKind::OpenAi => {
            AnyEmbedder::OpenAi(openai_embedder(config, key.expose(), timeout)?)
        }
        EmbeddingProviderKind::Compatible => AnyEmbedder::Compatible(CompatibleProvider::new(
            cfg.name.clone(),
            openai_embedder(config, key.expose(), timeout)?,
        )),
    };
    tracing::debug!(provider = cfg.provider.as_str(), model = %cfg.model, "embedder ready");
    Ok(embedder)
}

fn openai_embedder(
    config: &Config,
    api_key: &str,
    timeout: Duration,
) -> Result<OpenAiProvider, ConfigError> {
    let cfg = &config.embedding;
    let base_url = cfg.base_url.as_deref().ok_or_else(|| {
        ConfigError::Invalid(format!(
            "embedding.base_url is required for provider {}",
            cfg.provider.as_str()
        ))
    })?;
    Ok(OpenAiProvider::new(
        api_key.to_owned(),
        base_url,
        cfg.model.clone(),
        GenerationParams::default(),
    )
    .with_embedding_model(cfg.model.clone(), Some(cfg.dimensions))
    .with_client(client_with_timeout(timeout))
    .with_max_retries(cfg.max_retries))
}

/// # Errors
///
/// Returns `MissingCredential` if a Pinecone key is required and absent, and
/// `Backend` if the Qdrant client cannot be created.
pub async fn build_store(
    config: &Config,
    vault: &dyn VaultProvider,
) -> Result<Arc<dyn VectorStore>, ConfigError> {
    let cfg = &config.index;
    let store: Arc<dyn VectorStore> = match cfg.backend {
        IndexBackend::Pinecone => {
            let key = require_secret(vault, &cfg.api_key_env).await?;
            let mut pinecone = PineconeStore::new(
                key.expose().to_owned(),
                ServerlessSpec {
                    cloud: cfg.cloud.clone(),
                    region: cfg.region.clone(),
                },
            )
            .with_client(client_with_timeout(Duration::from_secs(
                config.timeouts.index_seconds,
            )));
            if let Some(url) = &cfg.control_url {
                pinecone = pinecone.with_control_url(url);
            }
            Arc::new(pinecone)
        }
        IndexBackend::Qdrant => {
            let key = if cfg.qdrant_api_key_env.is_empty() {
                None
            } else {
                vault
                    .get_secret(&cfg.qdrant_api_key_env)
                    .await
                    .map_err(|e| ConfigError::Backend(format!("vault lookup failed: {e:#}")))?
            };
            let ops = QdrantOps::new(&cfg.qdrant_url, key)
                .map_err(|e| ConfigError::Backend(format!("qdrant client: {e}")))?;
            Arc::new(ops)
        }
        IndexBackend::Memory => {
            tracing::warn!("using in-memory index; contents are lost on exit");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    tracing::debug!(backend = cfg.backend.as_str(), index = %cfg.name, "vector store ready");
    Ok(store)
}

/// # Errors
///
/// Returns `MissingCredential` if the generation API key is not in the vault.
pub async fn build_generator(
    config: &Config,
    vault: &dyn VaultProvider,
) -> Result<AnyProvider, ConfigError> {
    let cfg = &config.llm;
    let key = require_secret(vault, &cfg.api_key_env).await?;
    let openai = OpenAiProvider::new(
        key.expose().to_owned(),
        &cfg.base_url,
        cfg.model.clone(),
        GenerationParams {
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        },
    )
    .with_client(client_with_timeout(Duration::from_secs(
        config.timeouts.llm_seconds,
    )))
    .with_max_retries(cfg.max_retries);

    let provider = match cfg.provider {
        GenerationProviderKind::OpenAi => AnyProvider::OpenAi(openai),
        GenerationProviderKind::Compatible => {
            AnyProvider::Compatible(CompatibleProvider::new(cfg.name.clone(), openai))
        }
    };
    tracing::debug!(provider = cfg.provider.as_str(), model = %cfg.model, "generator ready");
    Ok(provider)
}

/// Build the retriever over the configured index.
///
/// # Errors
///
/// See [`build_store`] and [`build_embedder`].
pub async fn build_retriever(
    config: &Config,
    vault: &dyn VaultProvider,
) -> Result<Retriever, ConfigError> {
    let store = build_store(config, vault).await?;
    let embedder = build_embedder(config, vault).await?;
    Ok(Retriever::new(embedder, store, config.index.name.clone()))
}

/// Build the full answer pipeline. Index and embedding credentials are
/// checked before the generation credential.
///
/// # Errors
///
/// Returns the first `ConfigError` raised by any component.
pub async fn build_answer_service(
    config: &Config,
    vault: &dyn VaultProvider,
) -> Result<AnswerService, ConfigError> {
    let retriever = build_retriever(config, vault).await?;
    let generator = build_generator(config, vault).await?;
    tracing::info!(
        index = %config.index.name,
        top_k = config.retrieval.top_k,
        "answer service constructed"
    );
    Ok(AnswerService::new(
        retriever,
        generator,
        config.retrieval.top_k,
    ))
}

/// # Errors
///
/// See [`build_store`] and [`build_embedder`].
pub async fn build_ingestion_job(
    config: &Config,
    vault: &dyn VaultProvider,
) -> Result<IngestionJob, ConfigError> {
    let store = build_store(config, vault).await?;
    let embedder = build_embedder(config, vault).await?;
    Ok(IngestionJob::new(
        embedder,
        store,
        config.index.name.clone(),
        collection_spec(config),
    )
    .with_batch_size(config.ingest.batch_size)
    .with_ready_poll_interval(Duration::from_millis(
        config.ingest.ready_poll_interval_ms,
    )))
}
