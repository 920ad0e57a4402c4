//! Pinecone serverless backend for [`VectorStore`] over the REST API.
//!
//! Index management goes to the control plane. Each index has its own
//! data-plane host, discovered through `describe_index` and cached.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::vector_store::{
    BoxFuture, CollectionSpec, ConditionKind, FieldCondition, RangeBounds, ScoredVectorPoint,
    VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};

pub const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Records per upsert request. 3072-dimension vectors keep this under the
/// 2 MB request cap.
const UPSERT_CHUNK: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerlessSpec {
    pub cloud: String,
    pub region: String,
}

impl Default for ServerlessSpec {
    fn default() -> Self {
        Self {
            cloud: "aws".into(),
            region: "us-east-1".into(),
        }
    }
}

pub struct PineconeStore {
    client: reqwest::Client,
    api_key: String,
    control_url: String,
    serverless: ServerlessSpec,
    hosts: RwLock<HashMap<String, String>>,
}

impl fmt::Debug for PineconeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeStore")
            .field("api_key", &"<redacted>")
            .field("control_url", &self.control_url)
            .field("serverless", &self.serverless)
            .finish_non_exhaustive()
    }
}

impl PineconeStore {
    #[must_use]
    pub fn new(api_key: String, serverless: ServerlessSpec) -> Self {
        Self {
            client: vidhi_llm::http::default_client(),
            api_key,
            control_url: DEFAULT_CONTROL_URL.to_owned(),
            serverless,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_control_url(mut self, url: &str) -> Self {
        self.control_url = url.trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// `None` when the index does not exist.
    async fn describe(&self, index: &str) -> Result<Option<IndexDescription>, VectorStoreError> {
        let url = format!("{}/indexes/{index}", self.control_url);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        if !status.is_success() {
            return Err(VectorStoreError::Collection(format!(
                "describe index {index} failed ({status}): {body}"
            )));
        }
        let desc: IndexDescription = serde_json::from_str(&body)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        if !desc.host.is_empty()
            && let Ok(mut hosts) = self.hosts.write()
        {
            hosts.insert(index.to_owned(), data_plane_url(&desc.host));
        }
        Ok(Some(desc))
    }

    async fn host(&self, index: &str) -> Result<String, VectorStoreError> {
        if let Some(host) = self.hosts.read().ok().and_then(|h| h.get(index).cloned()) {
            return Ok(host);
        }
        match self.describe(index).await? {
            Some(desc) if !desc.host.is_empty() => Ok(data_plane_url(&desc.host)),
            Some(_) => Err(VectorStoreError::Collection(format!(
                "index {index} has no host yet"
            ))),
            None => Err(VectorStoreError::Collection(format!(
                "index {index} not found"
            ))),
        }
    }

    async fn post_data<B: Serialize + Sync>(
        &self,
        index: &str,
        path: &str,
        body: &B,
    ) -> Result<String, VectorStoreError> {
        let url = format!("{}/{path}", self.host(index).await?);
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(body)
            .send()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(VectorStoreError::Connection(format!(
                "{path} on {index} failed ({status}): {text}"
            )))
        }
    }
}

/// Hosts come back bare (`legal-bot-abc.svc.pinecone.io`).
fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_owned()
    } else {
        format!("https://{host}")
    }
}

impl VectorStore for PineconeStore {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { Ok(self.describe(&collection).await?.is_some()) })
    }

    fn create_collection(
        &self,
        collection: &str,
        spec: CollectionSpec,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let body = json!({
                "name": collection,
                "dimension": spec.dimension,
                "metric": spec.metric.as_str(),
                "spec": {
                    "serverless": {
                        "cloud": self.serverless.cloud,
                        "region": self.serverless.region,
                    }
                }
            });
            let url = format!("{}/indexes", self.control_url);
            let response = self
                .request(reqwest::Method::POST, &url)
                .json(&body)
                .send()
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

            let status = response.status();
            if status.is_success() || status == reqwest::StatusCode::CONFLICT {
                tracing::info!(index = %collection, dimension = spec.dimension, "pinecone index created");
                return Ok(());
            }
            let text = response.text().await.unwrap_or_default();
            Err(VectorStoreError::Collection(format!(
                "create index {collection} failed ({status}): {text}"
            )))
        })
    }

    fn collection_ready(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            Ok(self
                .describe(&collection)
                .await?
                .is_some_and(|d| d.status.ready))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let records: Vec<UpsertRecord> = points
                .into_iter()
                .map(|p| UpsertRecord {
                    id: p.id,
                    values: p.vector,
                    metadata: p.payload.into_iter().filter(|(_, v)| !v.is_null()).collect(),
                })
                .collect();
            let mut written = 0;
            for chunk in records.chunks(UPSERT_CHUNK) {
                if let Err(e) = self
                    .post_data(&collection, "vectors/upsert", &UpsertRequest { vectors: chunk })
                    .await
                {
                    return Err(if written == 0 {
                        VectorStoreError::Upsert(e.to_string())
                    } else {
                        VectorStoreError::PartialUpsert {
                            written,
                            reason: e.to_string(),
                        }
                    });
                }
                written += chunk.len();
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let body = QueryRequest {
                vector,
                top_k: limit,
                include_metadata: true,
                include_values: false,
                filter: filter.as_ref().and_then(vector_filter_to_pinecone),
            };
            let text = self
                .post_data(&collection, "query", &body)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let resp: QueryResponse = serde_json::from_str(&text)
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
            Ok(resp
                .matches
                .into_iter()
                .map(|m| ScoredVectorPoint {
                    id: m.id,
                    score: m.score,
                    payload: m.metadata.unwrap_or_default(),
                })
                .collect())
        })
    }
}

/// Lower a [`VectorFilter`] to Pinecone's `$`-operator syntax. `None` for an
/// empty filter.
#[must_use]
pub fn vector_filter_to_pinecone(filter: &VectorFilter) -> Option<Value> {
    let mut clauses: Vec<Value> = filter.must.iter().map(must_clause).collect();
    clauses.extend(filter.must_not.iter().map(must_not_clause));
    for group in &filter.any_of {
        let mut alternatives: Vec<Value> =
            group.iter().filter_map(vector_filter_to_pinecone).collect();
        if alternatives.len() < group.len() {
            // an empty alternative always matches
            continue;
        }
        clauses.push(match alternatives.len() {
            1 => alternatives.remove(0),
            _ => json!({ "$or": alternatives }),
        });
    }
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "$and": clauses })),
    }
}

fn field_clause(field: &str, op: &str, value: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(op.to_owned(), value);
    let mut outer = Map::new();
    outer.insert(field.to_owned(), Value::Object(inner));
    Value::Object(outer)
}

fn range_clause(field: &str, b: &RangeBounds) -> Value {
    let mut inner = Map::new();
    for (op, bound) in [("$gt", b.gt), ("$gte", b.gte), ("$lt", b.lt), ("$lte", b.lte)] {
        if let Some(v) = bound {
            inner.insert(op.to_owned(), json!(v));
        }
    }
    let mut outer = Map::new();
    outer.insert(field.to_owned(), Value::Object(inner));
    Value::Object(outer)
}

fn must_clause(cond: &FieldCondition) -> Value {
    match &cond.kind {
        ConditionKind::Match(v) => field_clause(&cond.field, "$eq", v.to_json()),
        ConditionKind::AnyOf(vs) => field_clause(
            &cond.field,
            "$in",
            Value::Array(vs.iter().map(crate::vector_store::FieldValue::to_json).collect()),
        ),
        ConditionKind::Range(b) => range_clause(&cond.field, b),
    }
}

fn must_not_clause(cond: &FieldCondition) -> Value {
    match &cond.kind {
        ConditionKind::Match(v) => field_clause(&cond.field, "$ne", v.to_json()),
        ConditionKind::AnyOf(vs) => field_clause(
            &cond.field,
            "$nin",
            Value::Array(vs.iter().map(crate::vector_store::FieldValue::to_json).collect()),
        ),
        // not (a AND b) == (not a) OR (not b)
        ConditionKind::Range(b) => {
            let mut alternatives = Vec::new();
            let complements = [
                (b.gt, "$lte"),
                (b.gte, "$lt"),
                (b.lt, "$gte"),
                (b.lte, "$gt"),
            ];
            for (bound, op) in complements {
                if let Some(v) = bound {
                    alternatives.push(field_clause(&cond.field, op, json!(v)));
                }
            }
            if alternatives.len() == 1 {
                alternatives.remove(0)
            } else {
                json!({ "$or": alternatives })
            }
        }
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [UpsertRecord],
}

#[derive(Serialize)]
struct UpsertRecord {
    id: String,
    values: Vec<f32>,
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: u64,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<HashMap<String, Value>>,
}

#[derive(Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}
