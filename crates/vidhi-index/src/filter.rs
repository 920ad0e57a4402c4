//! Client-supplied metadata filters.
//!
//! The accepted syntax is the Mongo-style operator subset Pinecone uses:
//!
//! ```json
//! {"act": "IPC", "year": {"$gte": 1860, "$lt": 1900}, "chapter": {"$nin": ["XVII"]}}
//! ```
//!
//! A bare scalar means equality. Top-level `$and` / `$or` take a list of
//! such filters and nest freely:
//!
//! ```json
//! {"$or": [{"act": "IPC"}, {"act": "CrPC", "section": {"$in": ["154", "156"]}}]}
//! ```
//!
//! Parsed filters lower to a backend-neutral [`VectorFilter`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::vector_store::{ConditionKind, FieldCondition, FieldValue, RangeBounds, VectorFilter};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown operator {op} on field {field}")]
    UnknownOperator { field: String, op: String },
    #[error("field {0} has an empty operator object")]
    EmptyOperators(String),
    #[error("field {0}: nested objects are not supported, use $-operators")]
    Nested(String),
    #[error("field {field}: {op} needs a number")]
    NotNumeric { field: String, op: String },
    #[error("field {field}: {op} needs a non-empty list of scalars")]
    NotAList { field: String, op: String },
    #[error("field {0}: value must be a string, number or boolean")]
    NotScalar(String),
    #[error("unknown logical operator {0}, expected $and or $or")]
    UnknownLogical(String),
    #[error("{0} needs a non-empty list of non-empty filter objects")]
    NotAFilterList(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(FieldValue),
    Ne(FieldValue),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<FieldValue>),
    Nin(Vec<FieldValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
}

/// Conjunction of per-field clauses and `$or` groups.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct MetadataFilter {
    clauses: Vec<FilterClause>,
    any_of: Vec<Vec<MetadataFilter>>,
}

impl MetadataFilter {
    #[must_use]
    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Disjunctions from `$or`; each group needs one matching alternative.
    #[must_use]
    pub fn any_of(&self) -> &[Vec<MetadataFilter>] {
        &self.any_of
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.any_of.is_empty()
    }

    /// `None` when there is nothing to filter on.
    #[must_use]
    pub fn to_vector_filter(&self) -> Option<VectorFilter> {
        if self.is_empty() {
            return None;
        }
        Some(self.lower())
    }

    fn lower(&self) -> VectorFilter {
        let mut filter = VectorFilter {
            any_of: self
                .any_of
                .iter()
                .map(|group| group.iter().map(MetadataFilter::lower).collect())
                .collect(),
            ..VectorFilter::default()
        };
        for clause in &self.clauses {
            let field = clause.field.clone();
            let range = |b: RangeBounds| FieldCondition {
                field: clause.field.clone(),
                kind: ConditionKind::Range(b),
            };
            match &clause.op {
                FilterOp::Eq(v) => filter.must.push(FieldCondition {
                    field,
                    kind: ConditionKind::Match(v.clone()),
                }),
                FilterOp::Ne(v) => filter.must_not.push(FieldCondition {
                    field,
                    kind: ConditionKind::Match(v.clone()),
                }),
                FilterOp::In(vs) => filter.must.push(FieldCondition {
                    field,
                    kind: ConditionKind::AnyOf(vs.clone()),
                }),
                FilterOp::Nin(vs) => filter.must_not.push(FieldCondition {
                    field,
                    kind: ConditionKind::AnyOf(vs.clone()),
                }),
                FilterOp::Gt(n) => filter.must.push(range(RangeBounds {
                    gt: Some(*n),
                    ..RangeBounds::default()
                })),
                FilterOp::Gte(n) => filter.must.push(range(RangeBounds {
                    gte: Some(*n),
                    ..RangeBounds::default()
                })),
                FilterOp::Lt(n) => filter.must.push(range(RangeBounds {
                    lt: Some(*n),
                    ..RangeBounds::default()
                })),
                FilterOp::Lte(n) => filter.must.push(range(RangeBounds {
                    lte: Some(*n),
                    ..RangeBounds::default()
                })),
            }
        }
        filter
    }
}

impl TryFrom<Map<String, Value>> for MetadataFilter {
    type Error = FilterError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut clauses = Vec::new();
        let mut any_of = Vec::new();
        for (field, value) in map {
            if field.starts_with('$') {
                match field.as_str() {
                    "$and" => {
                        for sub in filter_list(&field, value)? {
                            clauses.extend(sub.clauses);
                            any_of.extend(sub.any_of);
                        }
                    }
                    "$or" => any_of.push(filter_list(&field, value)?),
                    _ => return Err(FilterError::UnknownLogical(field)),
                }
                continue;
            }
            match value {
                Value::Object(ops) => {
                    if ops.is_empty() {
                        return Err(FilterError::EmptyOperators(field));
                    }
                    for (op, operand) in ops {
                        if !op.starts_with('$') {
                            return Err(FilterError::Nested(field));
                        }
                        let op = parse_op(&field, &op, operand)?;
                        clauses.push(FilterClause {
                            field: field.clone(),
                            op,
                        });
                    }
                }
                other => {
                    let v = scalar(&field, other)?;
                    clauses.push(FilterClause {
                        field,
                        op: FilterOp::Eq(v),
                    });
                }
            }
        }
        Ok(Self { clauses, any_of })
    }
}

fn filter_list(op: &str, value: Value) -> Result<Vec<MetadataFilter>, FilterError> {
    let not_a_list = || FilterError::NotAFilterList(op.to_owned());
    let Value::Array(items) = value else {
        return Err(not_a_list());
    };
    if items.is_empty() {
        return Err(not_a_list());
    }
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) if !map.is_empty() => MetadataFilter::try_from(map),
            _ => Err(not_a_list()),
        })
        .collect()
}

fn parse_op(field: &str, op: &str, operand: Value) -> Result<FilterOp, FilterError> {
    let number = |v: &Value| {
        v.as_f64().ok_or_else(|| FilterError::NotNumeric {
            field: field.to_owned(),
            op: op.to_owned(),
        })
    };
    Ok(match op {
        "$eq" => FilterOp::Eq(scalar(field, operand)?),
        "$ne" => FilterOp::Ne(scalar(field, operand)?),
        "$gt" => FilterOp::Gt(number(&operand)?),
        "$gte" => FilterOp::Gte(number(&operand)?),
        "$lt" => FilterOp::Lt(number(&operand)?),
        "$lte" => FilterOp::Lte(number(&operand)?),
        "$in" => FilterOp::In(list(field, op, operand)?),
        "$nin" => FilterOp::Nin(list(field, op, operand)?),
        _ => {
            return Err(FilterError::UnknownOperator {
                field: field.to_owned(),
                op: op.to_owned(),
            });
        }
    })
}

fn scalar(field: &str, value: Value) -> Result<FieldValue, FilterError> {
    match value {
        Value::String(s) => Ok(FieldValue::Text(s)),
        Value::Bool(b) => Ok(FieldValue::Bool(b)),
        Value::Number(n) => Ok(match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or_default()),
        }),
        _ => Err(FilterError::NotScalar(field.to_owned())),
    }
}

fn list(field: &str, op: &str, value: Value) -> Result<Vec<FieldValue>, FilterError> {
    let not_a_list = || FilterError::NotAList {
        field: field.to_owned(),
        op: op.to_owned(),
    };
    let Value::Array(items) = value else {
        return Err(not_a_list());
    };
    if items.is_empty() {
        return Err(not_a_list());
    }
    items
        .into_iter()
        .map(|v| scalar(field, v).map_err(|_| not_a_list()))
        .collect()
}
