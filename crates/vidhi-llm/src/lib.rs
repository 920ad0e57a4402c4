//! Embedding and generation provider abstraction and backend implementations.

pub mod any;
pub mod compatible;
pub mod error;
pub mod gemini;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;
mod retry;

pub use any::{AnyEmbedder, AnyProvider};
pub use error::LlmError;
pub use provider::{EmbeddingProvider, GenerationParams, LlmProvider, Message, Role};
