//! Product image generation in an analyzed style.

use crate::credentials::{CredentialSelector, ReauthPolicy};
use crate::error::{ArchitectError, Result};
use crate::image::{GeneratedImage, UploadedImage};
use crate::provider::{ContentRequest, GenerationConfig, GenerativeProvider, ImageConfig, Part};
use std::sync::Arc;
use std::time::Instant;

/// Maximum generated images per session.
pub const SESSION_LIMIT: usize = 5;

/// Aspect ratio requested for product shots.
pub const PRODUCT_ASPECT_RATIO: &str = "3:4";

/// Resolution hint sent to models that accept one.
pub const PRO_IMAGE_SIZE: &str = "1K";

/// Shown when the paid credential was rejected.
pub const CREDENTIAL_REJECTED_MESSAGE: &str =
    "Pro model error: Please re-select a valid paid API key.";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    Flash,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality, paid key required).
    Pro,
}

impl ImageModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
        }
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Flash => "Nano Banana (Flash)",
            Self::Pro => "Nano Banana Pro (HQ)",
        }
    }

    /// Returns true if the model needs a paid credential.
    pub fn requires_paid_credential(&self) -> bool {
        matches!(self, Self::Pro)
    }

    /// Returns the image settings sent with a request for this model.
    pub fn image_config(&self) -> ImageConfig {
        ImageConfig {
            aspect_ratio: PRODUCT_ASPECT_RATIO.to_string(),
            image_size: match self {
                Self::Flash => None,
                Self::Pro => Some(PRO_IMAGE_SIZE.to_string()),
            },
        }
    }
}

impl std::fmt::Display for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wraps the extracted style prompt in product-preserving instructions.
pub fn compose_instruction(style_prompt: &str) -> String {
    format!(
        "Professional e-commerce photography. Apply this style: {}. The central subject is the item in the attached image. Ensure the item maintains its core design, color, and features while being seamlessly integrated into the described environment and lighting.",
        style_prompt.trim()
    )
}

/// Builds the generation request for a product image.
pub fn build_generation_request(
    product: &UploadedImage,
    style_prompt: &str,
    model: ImageModel,
) -> ContentRequest {
    ContentRequest::from_parts(vec![
        Part::image(product),
        Part::text(compose_instruction(style_prompt)),
    ])
    .with_config(GenerationConfig {
        image_config: Some(model.image_config()),
        ..GenerationConfig::default()
    })
}

/// One product-image session over a completed analysis.
///
/// Generated images are kept newest first and capped at [`SESSION_LIMIT`].
/// [`GenerationSession::generate`] takes `&mut self`, so generations on a
/// session run one at a time and the cap check cannot race.
pub struct GenerationSession {
    provider: Arc<dyn GenerativeProvider>,
    credentials: Arc<dyn CredentialSelector>,
    policy: ReauthPolicy,
    style_prompt: String,
    model: ImageModel,
    product: Option<UploadedImage>,
    generated: Vec<GeneratedImage>,
}

impl GenerationSession {
    /// Creates a session that applies `style_prompt`.
    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        credentials: Arc<dyn CredentialSelector>,
        style_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            credentials,
            policy: ReauthPolicy::default(),
            style_prompt: style_prompt.into(),
            model: ImageModel::default(),
            product: None,
            generated: Vec::new(),
        }
    }

    /// Sets what happens after the credential selector closes.
    pub fn with_policy(mut self, policy: ReauthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Selects the image model.
    pub fn set_model(&mut self, model: ImageModel) {
        self.model = model;
    }

    /// Returns the selected image model.
    pub fn model(&self) -> ImageModel {
        self.model
    }

    /// Sets the product image.
    pub fn set_product_image(&mut self, image: UploadedImage) {
        self.product = Some(image);
    }

    /// Clears the product image.
    pub fn clear_product_image(&mut self) {
        self.product = None;
    }

    /// Returns the product image, if set.
    pub fn product_image(&self) -> Option<&UploadedImage> {
        self.product.as_ref()
    }

    /// Returns the style prompt applied by this session.
    pub fn style_prompt(&self) -> &str {
        &self.style_prompt
    }

    /// Returns the generated images, newest first.
    pub fn generated(&self) -> &[GeneratedImage] {
        &self.generated
    }

    /// Returns how many generations are left in this session.
    pub fn remaining(&self) -> usize {
        SESSION_LIMIT.saturating_sub(self.generated.len())
    }

    /// Checks the preconditions that do not involve the backend.
    pub fn check_ready(&self) -> Result<&UploadedImage> {
        let product = self.product.as_ref().ok_or(ArchitectError::MissingProductImage)?;
        if self.style_prompt.trim().is_empty() {
            return Err(ArchitectError::EmptyPrompt);
        }
        if self.generated.len() >= SESSION_LIMIT {
            return Err(ArchitectError::SessionLimitReached {
                limit: SESSION_LIMIT,
            });
        }
        Ok(product)
    }

    /// Generates one product image and prepends it to the session.
    ///
    /// Validation failures never reach the backend. A rejected paid
    /// credential reopens the selector and yields
    /// [`ArchitectError::CredentialRejected`]; other failures yield
    /// [`ArchitectError::Generation`]. The session is unchanged on failure.
    pub async fn generate(&mut self) -> Result<&GeneratedImage> {
        let product = self.check_ready()?.clone();

        if self.model.requires_paid_credential() {
            self.ensure_credential().await?;
        }

        let start = Instant::now();
        let request = build_generation_request(&product, &self.style_prompt, self.model);
        tracing::debug!(model = %self.model, "submitting product image generation");

        let url = match self.request_image(&request).await {
            Ok(url) => url,
            Err(e) if e.is_entity_not_found() => {
                tracing::warn!(model = %self.model, "credential rejected: {e}");
                self.credentials.open_selector().await;
                return Err(ArchitectError::CredentialRejected(
                    CREDENTIAL_REJECTED_MESSAGE.to_string(),
                ));
            }
            Err(e) => {
                tracing::warn!(model = %self.model, "product image generation failed: {e}");
                return Err(ArchitectError::Generation(Box::new(e)));
            }
        };

        self.generated.insert(0, GeneratedImage::new(url));
        tracing::debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            remaining = self.remaining(),
            "product image generated"
        );
        Ok(&self.generated[0])
    }

    async fn ensure_credential(&self) -> Result<()> {
        if self.credentials.has_selected_credential().await {
            return Ok(());
        }

        self.credentials.open_selector().await;

        match self.policy {
            ReauthPolicy::Optimistic => Ok(()),
            ReauthPolicy::Recheck => {
                if self.credentials.has_selected_credential().await {
                    Ok(())
                } else {
                    Err(ArchitectError::Auth(format!(
                        "{} requires a paid API key; none was selected",
                        self.model.display_name()
                    )))
                }
            }
        }
    }

    async fn request_image(&self, request: &ContentRequest) -> Result<String> {
        let response = self
            .provider
            .generate_content(self.model.as_str(), request)
            .await?;
        response
            .first_inline_data()
            .map(|inline| inline.to_data_url())
            .ok_or(ArchitectError::NoImageReturned)
    }
}
