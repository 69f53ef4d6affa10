//! The content generation boundary.
//!
//! The pipeline only ever sees [`ContentGenerator`]; [`HttpGenerator`] is the
//! bundled implementation for OpenAI-compatible chat endpoints.

pub mod article;
pub mod error;
pub mod http;

use async_trait::async_trait;

use crate::spreadsheet::RowSpec;

pub use article::{ArticleSection, EnrichedArticle, EnrichedSection, GeneratedArticle, PlacedImage};
pub use error::{ErrorClass, GenerationError};
pub use http::HttpGenerator;

/// Produces one article per row spec.
///
/// Implementations are shared across workers and may be called concurrently.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, spec: &RowSpec) -> Result<GeneratedArticle, GenerationError>;
}
