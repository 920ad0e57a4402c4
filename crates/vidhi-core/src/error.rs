use vidhi_index::IndexError;
use vidhi_llm::LlmError;

/// Failure to construct the answer pipeline. Raised at startup or on a
/// lazy initialization attempt, never by a single request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required API key is absent from the vault.
    #[error("{0} not found in environment")]
    MissingCredential(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A backend client could not be created.
    #[error("backend setup failed: {0}")]
    Backend(String),
}

/// Failure while answering one query.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
}
