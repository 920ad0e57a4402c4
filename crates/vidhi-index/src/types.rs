//! Corpus records and the metadata stored next to every vector.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Descriptive fields of a legal text chunk.
///
/// The common fields are typed; anything else the preprocessing step emits
/// is kept in `extra` and passed through to the index untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub act: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub section: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub chapter: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_string"
    )]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Accept `"378"`, `378` or `true` for a string field; `null` means absent.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {other}"
        ))),
    }
}

impl ChunkMetadata {
    /// Drop `null` extension values and the reserved `text` key, and reject
    /// the values a vector index cannot store as metadata.
    ///
    /// # Errors
    ///
    /// Returns the offending field name and a reason when an extension value
    /// is an object or a list containing anything but strings.
    pub fn normalize(&mut self) -> Result<(), (String, &'static str)> {
        self.extra.retain(|k, v| k != "text" && !v.is_null());
        for (key, value) in &self.extra {
            match value {
                Value::Object(_) => return Err((key.clone(), "nested objects are not supported")),
                Value::Array(items) if !items.iter().all(Value::is_string) => {
                    return Err((key.clone(), "lists may only contain strings"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// One unit of the preprocessed corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Metadata as stored in the index: the chunk's fields plus its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    #[serde(flatten)]
    pub fields: ChunkMetadata,
}

impl RecordMetadata {
    #[must_use]
    pub fn from_chunk(chunk: &DocumentChunk) -> Self {
        Self {
            text: chunk.text.clone(),
            fields: chunk.metadata.clone(),
        }
    }

    /// Flatten into the payload map handed to a vector store.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn into_payload(
        self,
    ) -> Result<std::collections::HashMap<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Ok(std::collections::HashMap::new()),
        }
    }
}
