//! Qdrant backend for [`VectorStore`].
//!
//! Qdrant point ids must be integers or UUIDs, so string chunk ids are mapped
//! to UUIDv5 values and the original id travels in the `chunk_id` payload key.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CollectionStatus, Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, Range,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, condition,
    point_id::PointIdOptions, value::Kind,
};

use crate::vector_store::{
    BoxFuture, CollectionSpec, ConditionKind, FieldCondition, FieldValue, Metric,
    ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Payload key holding the caller's string id.
pub const CHUNK_ID_KEY: &str = "chunk_id";

/// Thin wrapper over [`Qdrant`] client encapsulating collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given gRPC URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, api_key: Option<String>) -> QdrantResult<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Deterministic point id for a chunk id.
    #[must_use]
    pub fn point_id(chunk_id: &str) -> String {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
    }

    async fn is_green(&self, collection: &str) -> QdrantResult<bool> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(Box::new)?;
        Ok(info
            .result
            .is_some_and(|r| r.status == CollectionStatus::Green as i32))
    }

    async fn create(&self, collection: &str, spec: CollectionSpec) -> QdrantResult<()> {
        let distance = match spec.metric {
            Metric::Cosine => Distance::Cosine,
            Metric::Euclidean => Distance::Euclid,
            Metric::DotProduct => Distance::Dot,
        };
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(spec.dimension, distance)),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn search_points(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<Filter>,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let mut builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }
}

impl VectorStore for QdrantOps {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))
        })
    }

    fn create_collection(
        &self,
        collection: &str,
        spec: CollectionSpec,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.create(&collection, spec)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn collection_ready(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.is_green(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_points = points
                .into_iter()
                .map(vector_point_to_qdrant)
                .collect::<Result<Vec<_>, _>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points).wait(true))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
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
            let qdrant_filter = filter.filter(|f| !f.is_empty()).map(vector_filter_to_qdrant);
            let results = self
                .search_points(&collection, vector, limit, qdrant_filter)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(results.into_iter().map(scored_point_to_vector).collect())
        })
    }
}

fn vector_point_to_qdrant(p: VectorPoint) -> Result<PointStruct, VectorStoreError> {
    let mut payload = p.payload;
    payload.insert(CHUNK_ID_KEY.into(), serde_json::Value::String(p.id.clone()));
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
    Ok(PointStruct::new(QdrantOps::point_id(&p.id), p.vector, payload))
}

fn vector_filter_to_qdrant(filter: VectorFilter) -> Filter {
    let mut must: Vec<Condition> = filter
        .must
        .into_iter()
        .map(field_condition_to_qdrant)
        .collect();
    for group in filter.any_of {
        let alternatives: Vec<Condition> = group
            .into_iter()
            .map(|alt| nested(vector_filter_to_qdrant(alt)))
            .collect();
        must.push(nested(Filter::should(alternatives)));
    }
    Filter {
        must,
        must_not: filter
            .must_not
            .into_iter()
            .map(field_condition_to_qdrant)
            .collect(),
        ..Filter::default()
    }
}

fn field_condition_to_qdrant(cond: FieldCondition) -> Condition {
    let field = cond.field;
    match cond.kind {
        ConditionKind::Match(value) => value_condition(field, value),
        ConditionKind::AnyOf(values) => {
            if values.iter().all(|v| matches!(v, FieldValue::Text(_))) {
                let keywords: Vec<String> = values
                    .into_iter()
                    .filter_map(|v| match v {
                        FieldValue::Text(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                Condition::matches(field, keywords)
            } else if values.iter().all(|v| matches!(v, FieldValue::Integer(_))) {
                let ints: Vec<i64> = values
                    .into_iter()
                    .filter_map(|v| match v {
                        FieldValue::Integer(i) => Some(i),
                        _ => None,
                    })
                    .collect();
                Condition::matches(field, ints)
            } else {
                let should: Vec<Condition> = values
                    .into_iter()
                    .map(|v| value_condition(field.clone(), v))
                    .collect();
                nested(Filter::should(should))
            }
        }
        ConditionKind::Range(b) => Condition::range(
            field,
            Range {
                lt: b.lt,
                gt: b.gt,
                gte: b.gte,
                lte: b.lte,
            },
        ),
    }
}

fn value_condition(field: String, value: FieldValue) -> Condition {
    match value {
        FieldValue::Integer(v) => Condition::matches(field, v),
        FieldValue::Text(v) => Condition::matches(field, v),
        FieldValue::Bool(v) => Condition::matches(field, v),
        FieldValue::Float(v) => Condition::range(
            field,
            Range {
                gte: Some(v),
                lte: Some(v),
                ..Range::default()
            },
        ),
    }
}

fn nested(filter: Filter) -> Condition {
    Condition {
        condition_one_of: Some(condition::ConditionOneOf::Filter(filter)),
    }
}

fn qdrant_value_to_json(v: qdrant_client::qdrant::Value) -> Option<serde_json::Value> {
    Some(match v.kind? {
        Kind::StringValue(s) => serde_json::Value::String(s),
        Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
        Kind::DoubleValue(d) => serde_json::Number::from_f64(d).map(serde_json::Value::Number)?,
        Kind::BoolValue(b) => serde_json::Value::Bool(b),
        Kind::ListValue(list) => serde_json::Value::Array(
            list.values
                .into_iter()
                .filter_map(qdrant_value_to_json)
                .collect(),
        ),
        Kind::StructValue(s) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .filter_map(|(k, v)| Some((k, qdrant_value_to_json(v)?)))
                .collect(),
        ),
        Kind::NullValue(_) => return None,
    })
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let mut payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| Some((k, qdrant_value_to_json(v)?)))
        .collect();

    let id = match payload.remove(CHUNK_ID_KEY) {
        Some(serde_json::Value::String(id)) => id,
        _ => match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Uuid(u)) => u,
            Some(PointIdOptions::Num(n)) => n.to_string(),
            None => String::new(),
        },
    };

    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::RangeBounds;

    #[test]
    fn new_valid_url() {
        assert!(QdrantOps::new("http://localhost:6334", None).is_ok());
    }

    #[test]
    fn new_invalid_url() {
        assert!(QdrantOps::new("not a valid url", None).is_err());
    }

    #[test]
    fn debug_format() {
        let ops = QdrantOps::new("http://localhost:6334", Some("secret".into())).unwrap();
        let dbg = format!("{ops:?}");
        assert!(dbg.contains("QdrantOps"));
        assert!(!dbg.contains("secret"));
    }

    #[test]
    fn point_id_is_stable_uuid() {
        let a = QdrantOps::point_id("ipc-378");
        assert_eq!(a, QdrantOps::point_id("ipc-378"));
        assert_ne!(a, QdrantOps::point_id("ipc-379"));
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn point_carries_chunk_id_payload() {
        let p = VectorPoint {
            id: "ipc-378".into(),
            vector: vec![0.1, 0.2],
            payload: HashMap::from([("act".into(), serde_json::json!("IPC"))]),
        };
        let q = vector_point_to_qdrant(p).unwrap();
        assert!(q.payload.contains_key(CHUNK_ID_KEY));
        assert!(q.payload.contains_key("act"));
    }

    #[test]
    fn filter_lowering_keeps_must_and_must_not() {
        let filter = VectorFilter {
            must: vec![
                FieldCondition {
                    field: "act".into(),
                    kind: ConditionKind::Match(FieldValue::Text("IPC".into())),
                },
                FieldCondition {
                    field: "year".into(),
                    kind: ConditionKind::Range(RangeBounds {
                        lt: Some(1900.0),
                        ..RangeBounds::default()
                    }),
                },
            ],
            must_not: vec![FieldCondition {
                field: "chapter".into(),
                kind: ConditionKind::AnyOf(vec![
                    FieldValue::Text("XVII".into()),
                    FieldValue::Integer(17),
                ]),
            }],
            ..VectorFilter::default()
        };
        let q = vector_filter_to_qdrant(filter);
        assert_eq!(q.must.len(), 2);
        assert_eq!(q.must_not.len(), 1);
        assert!(matches!(
            q.must_not[0].condition_one_of,
            Some(condition::ConditionOneOf::Filter(_))
        ));
    }

    #[test]
    fn any_of_group_lowers_to_nested_should() {
        let act = |name: &str| VectorFilter {
            must: vec![FieldCondition {
                field: "act".into(),
                kind: ConditionKind::Match(FieldValue::Text(name.into())),
            }],
            ..VectorFilter::default()
        };
        let filter = VectorFilter {
            any_of: vec![vec![act("IPC"), act("CrPC")]],
            ..VectorFilter::default()
        };
        let q = vector_filter_to_qdrant(filter);
        assert_eq!(q.must.len(), 1);
        let Some(condition::ConditionOneOf::Filter(group)) = &q.must[0].condition_one_of else {
            panic!("expected a nested filter");
        };
        assert_eq!(group.should.len(), 2);
        assert!(group.must.is_empty());
    }

    #[test]
    fn mixed_any_of_values_lower_to_should() {
        let q = vector_filter_to_qdrant(VectorFilter {
            must: vec![FieldCondition {
                field: "section".into(),
                kind: ConditionKind::AnyOf(vec![
                    FieldValue::Text("378".into()),
                    FieldValue::Integer(378),
                ]),
            }],
            ..VectorFilter::default()
        });
        let Some(condition::ConditionOneOf::Filter(inner)) = &q.must[0].condition_one_of else {
            panic!("expected a nested filter");
        };
        assert_eq!(inner.should.len(), 2);
    }

    #[test]
    fn scored_point_restores_chunk_id_and_nested_values() {
        let payload: HashMap<String, qdrant_client::qdrant::Value> = serde_json::from_value(
            serde_json::json!({
                "chunk_id": "ipc-378",
                "text": "Section 378 defines theft.",
                "tags": ["theft", "property"],
            }),
        )
        .unwrap();
        let point = ScoredPoint {
            payload,
            score: 0.9,
            ..ScoredPoint::default()
        };
        let v = scored_point_to_vector(point);
        assert_eq!(v.id, "ipc-378");
        assert!(!v.payload.contains_key(CHUNK_ID_KEY));
        assert_eq!(v.payload["tags"], serde_json::json!(["theft", "property"]));
    }
}
