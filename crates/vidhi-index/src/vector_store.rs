use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    /// The first `written` points of the request were stored before the
    /// backend failed.
    #[error("upsert stopped after {written} records: {reason}")]
    PartialUpsert { written: usize, reason: String },
    #[error("search error: {0}")]
    Search(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VectorStoreError {
    /// Points that reached the index before the failure.
    #[must_use]
    pub fn records_written(&self) -> usize {
        match self {
            Self::PartialUpsert { written, .. } => *written,
            _ => 0,
        }
    }
}

/// Similarity metric of an index, named the way Pinecone names them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl Metric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dotproduct",
        }
    }
}

/// Shape of a collection, fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub dimension: u64,
    pub metric: Metric,
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Backend-neutral metadata filter. All `must` conditions hold, no
/// `must_not` condition holds, and every `any_of` group has at least one
/// alternative that holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
    pub any_of: Vec<Vec<VectorFilter>>,
}

impl VectorFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty() && self.any_of.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub kind: ConditionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    Match(FieldValue),
    AnyOf(Vec<FieldValue>),
    Range(RangeBounds),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<f64>,
    pub gte: Option<f64>,
    pub lt: Option<f64>,
    pub lte: Option<f64>,
}

impl RangeBounds {
    #[must_use]
    pub fn contains(&self, v: f64) -> bool {
        self.gt.is_none_or(|b| v > b)
            && self.gte.is_none_or(|b| v >= b)
            && self.lt.is_none_or(|b| v < b)
            && self.lte.is_none_or(|b| v <= b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::from(s.as_str()),
            Self::Bool(b) => serde_json::Value::from(*b),
        }
    }

    /// Scalar equality against a JSON payload value. A list payload matches
    /// when any of its elements does.
    #[must_use]
    pub fn matches_json(&self, val: &serde_json::Value) -> bool {
        if let Some(items) = val.as_array() {
            return items.iter().any(|item| self.matches_json(item));
        }
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => val.as_f64() == Some(*i as f64),
            Self::Float(f) => val.as_f64() == Some(*f),
            Self::Text(s) => val.as_str() == Some(s.as_str()),
            Self::Bool(b) => val.as_bool() == Some(*b),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistent nearest-neighbour index keyed by string id.
///
/// `upsert` overwrites points with the same id. `search` returns at most
/// `limit` points in descending similarity order.
pub trait VectorStore: Send + Sync {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn create_collection(
        &self,
        collection: &str,
        spec: CollectionSpec,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Whether a freshly created collection accepts reads and writes.
    fn collection_ready(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_uses_pinecone_names() {
        assert_eq!(serde_json::to_string(&Metric::DotProduct).unwrap(), "\"dotproduct\"");
        assert_eq!(Metric::default().as_str(), "cosine");
        let m: Metric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(m, Metric::Euclidean);
    }

    #[test]
    fn range_bounds_are_inclusive_or_exclusive() {
        let r = RangeBounds {
            gte: Some(1.0),
            lt: Some(3.0),
            ..RangeBounds::default()
        };
        assert!(r.contains(1.0));
        assert!(r.contains(2.5));
        assert!(!r.contains(3.0));
        assert!(RangeBounds::default().contains(-100.0));
    }

    #[test]
    fn integer_matches_whole_float_payload() {
        assert!(FieldValue::Integer(378).matches_json(&serde_json::json!(378)));
        assert!(FieldValue::Integer(378).matches_json(&serde_json::json!(378.0)));
        assert!(!FieldValue::Integer(378).matches_json(&serde_json::json!("378")));
    }

    #[test]
    fn list_payload_matches_any_element() {
        let tags = serde_json::json!(["theft", "property"]);
        assert!(FieldValue::Text("theft".into()).matches_json(&tags));
        assert!(!FieldValue::Text("murder".into()).matches_json(&tags));
    }

    #[test]
    fn empty_filter() {
        assert!(VectorFilter::default().is_empty());
        let grouped = VectorFilter {
            any_of: vec![vec![VectorFilter::default()]],
            ..VectorFilter::default()
        };
        assert!(!grouped.is_empty());
    }
}
