//! Loading the preprocessed corpus file.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{IndexError, Result};
use crate::types::DocumentChunk;

/// Load the preprocessed corpus: a JSON array of `{id, text, metadata}`.
///
/// Duplicate ids are kept; the last one written to the index wins. Records
/// are not validated here: a bad record fails only its own ingestion batch.
///
/// # Errors
///
/// Returns `DataNotFound` if the file is missing and `Json` if it does not
/// parse.
pub async fn load_corpus(path: &Path) -> Result<Vec<DocumentChunk>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IndexError::DataNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let chunks: Vec<DocumentChunk> = serde_json::from_str(&raw)?;
    let mut seen = HashSet::with_capacity(chunks.len());

    for chunk in &chunks {
        if !seen.insert(chunk.id.clone()) {
            tracing::warn!(id = %chunk.id, "duplicate chunk id in corpus, last one wins");
        }
        if chunk.text.trim().is_empty() {
            tracing::warn!(id = %chunk.id, "chunk has empty text");
        }
    }

    tracing::info!(path = %path.display(), chunks = chunks.len(), "corpus loaded");
    Ok(chunks)
}
