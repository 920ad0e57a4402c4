use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_providers();
        self.apply_env_overrides_service();
    }

    fn apply_env_overrides_providers(&mut self) {
        if let Ok(v) = std::env::var("VIDHI_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid VIDHI_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("VIDHI_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("VIDHI_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("VIDHI_EMBEDDING_DIMENSIONS")
            && let Ok(dims) = v.parse::<usize>()
        {
            self.embedding.dimensions = dims;
        }
        if let Ok(v) = std::env::var("VIDHI_INDEX_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.index.backend = backend;
            } else {
                tracing::warn!("ignoring invalid VIDHI_INDEX_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("VIDHI_INDEX_NAME") {
            self.index.name = v;
        }
        if let Ok(v) = std::env::var("VIDHI_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("VIDHI_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid VIDHI_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("VIDHI_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("VIDHI_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("VIDHI_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
    }

    fn apply_env_overrides_service(&mut self) {
        if let Ok(v) = std::env::var("VIDHI_SERVICE_NAME") {
            self.service.name = v;
        }
        if let Ok(v) = std::env::var("VIDHI_RETRIEVAL_TOP_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("VIDHI_INGEST_CORPUS_PATH") {
            self.ingest.corpus_path = v.into();
        }
        if let Ok(v) = std::env::var("VIDHI_INGEST_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.batch_size = n;
        }
        if let Ok(v) = std::env::var("VIDHI_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("VIDHI_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("VIDHI_GATEWAY_MAX_BODY_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.gateway.max_body_size = n;
        }
        if let Ok(v) = std::env::var("VIDHI_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("VIDHI_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("VIDHI_TIMEOUT_INDEX")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.index_seconds = secs;
        }
    }
}
