//! Text generation capability boundary
//!
//! The language model is an external collaborator: the engine only depends
//! on the [`TextGenerator`] trait. `ExtractiveGenerator` keeps the pipeline
//! usable fully offline by rendering retrieved sources verbatim, and
//! [`mock::MockGenerator`] scripts responses for tests.

mod mock;
mod tasks;

pub use mock::MockGenerator;
pub use tasks::{PromptTemplate, TaskRegistry};

use async_trait::async_trait;
use thiserror::Error;

/// Marker introducing the sources block inside generation prompts. The
/// prompt builder and the extractive fallback both rely on it.
pub const SOURCES_HEADER: &str = "### Sources";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation backend failed: {0}")]
    Backend(String),

    #[error("Generation returned empty output")]
    Empty,

    #[error("Generation timed out")]
    Timeout,
}

/// Opaque text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce text for `prompt`, optionally under a system instruction.
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, GenerationError>;
}

/// Offline fallback generator: answers with the prompt's sources block,
/// verbatim. No model, no network.
pub struct ExtractiveGenerator;

#[async_trait]
impl TextGenerator for ExtractiveGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _system: Option<&str>,
    ) -> Result<String, GenerationError> {
        let body = match prompt.find(SOURCES_HEADER) {
            Some(pos) => prompt[pos + SOURCES_HEADER.len()..].trim(),
            None => prompt.trim(),
        };

        if body.is_empty() {
            return Err(GenerationError::Empty);
        }

        Ok(body.to_string())
    }
}
