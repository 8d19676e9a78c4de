//! The app generator a session asks for new documents.

use std::future::Future;

pub use prism_core::Generation;

/// Generator failures. Never fatal: the session records one error entry in
/// the chat and keeps the previous document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    Failed(String),
    EmptyResponse,
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(e) => write!(f, "Generation failed: {e}"),
            Self::EmptyResponse => write!(f, "Generator returned no document"),
        }
    }
}

impl std::error::Error for GeneratorError {}

/// Produces a new document from a prompt and, when there is one, the
/// current document and a reference image (base64).
pub trait Generator {
    fn generate(
        &self,
        prompt: &str,
        current_code: Option<&str>,
        attachment: Option<&str>,
    ) -> impl Future<Output = Result<Generation, GeneratorError>> + Send;
}
