#![warn(missing_docs)]
//! Prompt Architect - reverse-engineer a photographic style and apply it to products.
//!
//! Reference images are sent to a Gemini vision model, which answers with a
//! style description under three headings (agent system prompt, positive
//! prompt, negative prompt). The positive prompt can then restyle a product
//! photo through a Gemini image model.
//!
//! # Quick Start
//!
//! ```no_run
//! use prompt_architect::{
//!     AppController, GeminiClient, JsonFileRepository, StaticCredentials, StyleAnalyzer,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> prompt_architect::Result<()> {
//!     let client = Arc::new(GeminiClient::builder().build()?);
//!     let analyzer = StyleAnalyzer::new(client);
//!     let mut app = AppController::new(analyzer, JsonFileRepository::new("history.json"));
//!
//!     app.add_images(&["ref-1.jpg", "ref-2.jpg"]).await?;
//!     app.start_analysis().await?;
//!
//!     let mut lab = app.open_lab(Arc::new(StaticCredentials::new(false)))?;
//!     lab.set_product_image(prompt_architect::ingest::load_image("bag.png".as_ref()).await?);
//!     let image = lab.generate().await?;
//!     image.save("bag-styled.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `prompt-architect` command-line interface

mod error;

pub mod analysis;
pub mod config;
pub mod credentials;
pub mod generation;
pub mod history;
pub mod image;
pub mod ingest;
pub mod provider;
pub mod providers;
pub mod sections;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export error types at crate root
pub use error::{ArchitectError, Result, ENTITY_NOT_FOUND};

pub use analysis::{AnalysisConfig, ProgressTicker, StyleAnalyzer};
pub use config::Settings;
pub use credentials::{CredentialSelector, ReauthPolicy, StaticCredentials};
pub use generation::{GenerationSession, ImageModel, SESSION_LIMIT};
pub use history::{
    HistoryRepository, HistoryStore, JsonFileRepository, MemoryRepository, SavedStyle,
    HISTORY_LIMIT,
};
pub use image::{GeneratedImage, ImageFormat, UploadedImage};
pub use ingest::{IngestReport, UploadSet, MAX_REFERENCE_IMAGES};
pub use provider::{ContentRequest, ContentResponse, GenerativeProvider};
pub use providers::{GeminiClient, GeminiClientBuilder};
pub use sections::{ExtractedSections, SectionKind, SectionLabels};
pub use state::{AppController, AppEvent, AppStatus};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ArchitectError, Result};
    pub use crate::{
        AppController, AppStatus, CredentialSelector, ExtractedSections, GeminiClient,
        GenerationSession, GenerativeProvider, HistoryRepository, ImageModel, StyleAnalyzer,
        UploadedImage,
    };
}
