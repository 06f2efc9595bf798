//! Generative backend trait and wire types.

mod types;

pub use types::{
    Candidate, Content, ContentRequest, ContentResponse, GenerationConfig, ImageConfig, InlineData,
    Part, PromptFeedback, ThinkingConfig,
};

use crate::error::Result;
use async_trait::async_trait;

/// A backend able to answer `generateContent` requests.
///
/// Both the style analysis and the product image generation go through this
/// seam, so tests can script responses without a network.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Sends one request to `model` and returns its response.
    async fn generate_content(&self, model: &str, request: &ContentRequest)
        -> Result<ContentResponse>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
