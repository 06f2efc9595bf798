//! Error types for style analysis and product image generation.

use std::time::Duration;

/// Message fragment Google returns when a model or credential cannot be resolved.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Maximum length of an API error body carried into an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while analyzing styles or generating images.
#[derive(Debug, thiserror::Error)]
pub enum ArchitectError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The service could not resolve the model or the credential behind the request.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The response parsed but did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A batch would push the reference set over its cap.
    #[error("You can only upload up to {max} images ({held} held, {incoming} selected).")]
    TooManyImages {
        held: usize,
        incoming: usize,
        max: usize,
    },

    /// Generation was attempted without a product image.
    #[error("a product image is required")]
    MissingProductImage,

    /// Generation was attempted without a positive style prompt.
    #[error("the positive prompt is empty")]
    EmptyPrompt,

    /// The per-session generation cap has been reached.
    #[error("Session limit of {limit} images reached. Restart for more variations.")]
    SessionLimitReached { limit: usize },

    /// The style analysis call failed.
    #[error("analysis failed: {0}")]
    Analysis(#[source] Box<ArchitectError>),

    /// The image generation call failed.
    #[error("Generation failed. {0}")]
    Generation(#[source] Box<ArchitectError>),

    /// The paid credential was rejected and the user was asked to pick another.
    #[error("{0}")]
    CredentialRejected(String),

    /// The generation response carried no inline image.
    #[error("No image data returned from model.")]
    NoImageReturned,

    /// A state transition was requested from a state that does not allow it.
    #[error("cannot apply {event} while {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data or a data URL.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., reading an image, writing the history file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArchitectError {
    /// Returns true if the service reported an entity-not-found class error.
    ///
    /// Looks through `Analysis`/`Generation` wrappers.
    pub fn is_entity_not_found(&self) -> bool {
        match self {
            Self::EntityNotFound(_) => true,
            Self::Api { message, .. } => message.contains(ENTITY_NOT_FOUND),
            Self::Analysis(inner) | Self::Generation(inner) => inner.is_entity_not_found(),
            _ => false,
        }
    }

    /// Returns true for input-validation errors that never reach the service.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::TooManyImages { .. }
                | Self::MissingProductImage
                | Self::EmptyPrompt
                | Self::SessionLimitReached { .. }
        )
    }

    /// Returns the suggested retry delay, if the service sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for prompt-architect operations.
pub type Result<T> = std::result::Result<T, ArchitectError>;

/// Parses a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Reduces an API error body to a readable message.
///
/// Google wraps errors as `{"error": {"message": "..."}}`; that message is
/// preferred. Anything else is truncated.
pub(crate) fn sanitize_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
