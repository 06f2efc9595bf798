//! Gemini (Google) `generateContent` client.

use crate::error::{parse_retry_after, sanitize_error_message, ArchitectError, Result, ENTITY_NOT_FOUND};
use crate::provider::{ContentRequest, ContentResponse, GenerativeProvider};
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Builder for GeminiClient.
#[derive(Debug, Clone)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl Default for GeminiClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            http_client: None,
        }
    }
}

impl GeminiClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the REST base URL (proxies, tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets a per-request timeout. No timeout by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Supplies a preconfigured HTTP client. Takes precedence over `timeout`.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            })
            .ok_or_else(|| {
                ArchitectError::Auth(
                    "GEMINI_API_KEY (or GOOGLE_API_KEY / API_KEY) not set and no API key provided"
                        .into(),
                )
            })?;

        let client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        Ok(GeminiClient {
            client,
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Gemini REST client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClientBuilder`.
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate_impl(&self, model: &str, request: &ContentRequest) -> Result<ContentResponse> {
        let start = Instant::now();
        tracing::debug!(model, parts = request.parts().len(), "submitting generateContent request");

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let body: ContentResponse = response.json().await?;
        body.check_blocked()?;

        tracing::debug!(
            model,
            duration_ms = start.elapsed().as_millis() as u64,
            "generateContent complete"
        );
        Ok(body)
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> ArchitectError {
    let text = sanitize_error_message(text);
    if text.contains(ENTITY_NOT_FOUND) {
        return ArchitectError::EntityNotFound(text);
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return ArchitectError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return ArchitectError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return ArchitectError::ContentBlocked(text);
    }
    ArchitectError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &ContentRequest,
    ) -> Result<ContentResponse> {
        self.generate_impl(model, request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(ArchitectError::Auth("Invalid API key".into())),
            s if !(200..300).contains(&s) => Err(ArchitectError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}
