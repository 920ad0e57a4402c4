//! Configuration, answer pipeline and service bootstrap for Vidhi.

pub mod answer;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod prompt;
pub mod supervisor;
pub mod vault;

pub use answer::{Answer, AnswerService};
pub use config::Config;
pub use error::{AnswerError, ConfigError};
pub use supervisor::ServiceSlot;
