//! Generative backend implementations.

mod gemini;

pub use gemini::{GeminiClient, GeminiClientBuilder, API_KEY_ENV_VARS, DEFAULT_BASE_URL};
