use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, CollectionSpec, ConditionKind, FieldCondition, Metric, ScoredVectorPoint,
    VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    spec: CollectionSpec,
    /// Readiness checks left to answer `false`.
    warmup_left: u32,
    points: HashMap<String, StoredPoint>,
}

/// Process-local vector store for tests and local development.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
    warmup_polls: u32,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            warmup_polls: 0,
        }
    }

    /// Newly created collections report not-ready for the first `polls` checks.
    #[must_use]
    pub fn with_warmup_polls(mut self, polls: u32) -> Self {
        self.warmup_polls = polls;
        self
    }

    /// Number of points in `collection`, `None` if it does not exist.
    #[must_use]
    pub fn len(&self, collection: &str) -> Option<usize> {
        let cols = self.collections.read().ok()?;
        cols.get(collection).map(|c| c.points.len())
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("warmup_polls", &self.warmup_polls)
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::DotProduct => dot_product(a, b),
        // Negated so that higher is always closer.
        Metric::Euclidean => -a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &VectorFilter) -> bool {
    for cond in &filter.must {
        let Some(val) = payload.get(&cond.field) else {
            return false;
        };
        if !condition_matches(val, cond) {
            return false;
        }
    }
    for cond in &filter.must_not {
        if let Some(val) = payload.get(&cond.field)
            && condition_matches(val, cond)
        {
            return false;
        }
    }
    filter
        .any_of
        .iter()
        .all(|group| group.iter().any(|alt| matches_filter(payload, alt)))
}

fn condition_matches(val: &serde_json::Value, cond: &FieldCondition) -> bool {
    match &cond.kind {
        ConditionKind::Match(expected) => expected.matches_json(val),
        ConditionKind::AnyOf(options) => options.iter().any(|o| o.matches_json(val)),
        ConditionKind::Range(bounds) => val.as_f64().is_some_and(|v| bounds.contains(v)),
    }
}

impl VectorStore for InMemoryVectorStore {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn create_collection(
        &self,
        collection: &str,
        spec: CollectionSpec,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_insert_with(|| InMemoryCollection {
                spec,
                warmup_left: self.warmup_polls,
                points: HashMap::new(),
            });
            Ok(())
        })
    }

    fn collection_ready(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Collection(format!("collection {collection} not found"))
            })?;
            if col.warmup_left > 0 {
                col.warmup_left -= 1;
                return Ok(false);
            }
            Ok(true)
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            if let Some(bad) = points
                .iter()
                .find(|p| p.vector.len() as u64 != col.spec.dimension)
            {
                return Err(VectorStoreError::Upsert(format!(
                    "vector for {} has dimension {}, collection expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.spec.dimension
                )));
            }
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
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
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .filter(|(_, sp)| matches_filter(&sp.payload, f))
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: score(col.spec.metric, &vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::{FieldValue, RangeBounds};

    const SPEC: CollectionSpec = CollectionSpec {
        dimension: 3,
        metric: Metric::Cosine,
    };

    fn point(id: &str, vector: [f32; 3], payload: serde_json::Value) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector: vector.to_vec(),
            payload: serde_json::from_value(payload).unwrap(),
        }
    }

    async fn seeded() -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store.create_collection("legal", SPEC).await.unwrap();
        store
            .upsert(
                "legal",
                vec![
                    point("ipc-378", [1.0, 0.0, 0.0], serde_json::json!({"act": "IPC", "year": 1860})),
                    point("crpc-154", [0.8, 0.2, 0.0], serde_json::json!({"act": "CrPC", "year": 1973})),
                    point("ita-66", [0.0, 1.0, 0.0], serde_json::json!({"act": "IT Act", "year": 2000})),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_collection_and_exists() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("legal").await.unwrap());
        store.create_collection("legal", SPEC).await.unwrap();
        assert!(store.collection_exists("legal").await.unwrap());
        assert_eq!(store.len("legal"), Some(0));
    }

    #[tokio::test]
    async fn warmup_polls_delay_readiness() {
        let store = InMemoryVectorStore::new().with_warmup_polls(2);
        store.create_collection("legal", SPEC).await.unwrap();
        assert!(!store.collection_ready("legal").await.unwrap());
        assert!(!store.collection_ready("legal").await.unwrap());
        assert!(store.collection_ready("legal").await.unwrap());
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_truncates() {
        let store = seeded().await;
        let results = store
            .search("legal", vec![1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "ipc-378");
        assert_eq!(results[1].id, "crpc-154");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn upsert_overwrites_same_id() {
        let store = seeded().await;
        store
            .upsert(
                "legal",
                vec![point("ipc-378", [0.0, 0.0, 1.0], serde_json::json!({"act": "IPC"}))],
            )
            .await
            .unwrap();
        assert_eq!(store.len("legal"), Some(3));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = seeded().await;
        let bad = VectorPoint {
            id: "x".into(),
            vector: vec![1.0; 5],
            payload: HashMap::new(),
        };
        let err = store.upsert("legal", vec![bad]).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn search_with_match_filter() {
        let store = seeded().await;
        let filter = VectorFilter {
            must: vec![FieldCondition {
                field: "act".into(),
                kind: ConditionKind::Match(FieldValue::Text("CrPC".into())),
            }],
            ..VectorFilter::default()
        };
        let results = store
            .search("legal", vec![1.0, 0.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "crpc-154");
    }

    #[tokio::test]
    async fn search_with_range_and_must_not() {
        let store = seeded().await;
        let filter = VectorFilter {
            must: vec![FieldCondition {
                field: "year".into(),
                kind: ConditionKind::Range(RangeBounds {
                    gte: Some(1900.0),
                    ..RangeBounds::default()
                }),
            }],
            must_not: vec![FieldCondition {
                field: "act".into(),
                kind: ConditionKind::AnyOf(vec![FieldValue::Text("IT Act".into())]),
            }],
            ..VectorFilter::default()
        };
        let results = store
            .search("legal", vec![1.0, 0.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "crpc-154");
    }

    #[tokio::test]
    async fn search_with_any_of_group() {
        let store = seeded().await;
        let act = |name: &str| VectorFilter {
            must: vec![FieldCondition {
                field: "act".into(),
                kind: ConditionKind::Match(FieldValue::Text(name.into())),
            }],
            ..VectorFilter::default()
        };
        let filter = VectorFilter {
            any_of: vec![vec![act("IPC"), act("IT Act")]],
            ..VectorFilter::default()
        };
        let results = store
            .search("legal", vec![1.0, 0.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["ipc-378", "ita-66"]);
    }

    #[tokio::test]
    async fn search_missing_collection_is_error() {
        let store = InMemoryVectorStore::new();
        let err = store.search("nope", vec![1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Search(_)));
    }

    #[test]
    fn euclidean_score_prefers_nearer_points() {
        let q = [0.0, 0.0];
        assert!(score(Metric::Euclidean, &q, &[1.0, 0.0]) > score(Metric::Euclidean, &q, &[3.0, 4.0]));
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }
}
