//! Style analysis: turns reference images into a structured prompt answer.

use crate::error::{ArchitectError, Result};
use crate::image::UploadedImage;
use crate::provider::{ContentRequest, GenerationConfig, GenerativeProvider, Part, ThinkingConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default model for style analysis.
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-pro-preview";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default reasoning budget in tokens.
pub const DEFAULT_THINKING_BUDGET: u32 = 4000;

/// Returned when the model answers with no text.
pub const EMPTY_RESPONSE_FALLBACK: &str = "Failed to generate response.";

/// Instructional preamble sent ahead of the reference images.
pub const ANALYSIS_PROMPT: &str = r#"
【角色设定 (Role Definition)】 你是一位资深视觉艺术总监兼AI提示词工程师。你拥有敏锐的图像分析能力，能够从一组参考图片中精准提取摄影风格、布光逻辑、构图模式和氛围特征，并将其转化为结构化的 AI 绘画提示词（Prompt）。

【核心任务 (Core Task)】 用户的输入将是一组风格参考图片（通常是服装/商品摄影）。 你的任务是：
1. 深度解析 these images' visual language (lighting, perspective, background, texture).
2. Write a complete "Generation Prompt". This set of prompts must guide the AI to perfectly replicate the style of the reference image, while including strict "anti-artifact" instructions.

【分析框架 (Analysis Framework)】
- Lighting: Hard vs soft? Natural, studio, or neon?
- Composition: Subject positioning, camera angle.
- Background: Setting details.
- Mood: Minimalist, vintage, cyberpunk, etc.

【输出规范 (Output Format)】
### 1. Agent 系统设定 (System Prompt)
### 2. 正向提示词 (Positive Prompt)
### 3. 负向提示词 (Negative Prompt)
"#;

/// Closing instruction sent after the reference images.
pub const ANALYSIS_CLOSING: &str = "请分析以上图片并生成对应的生图Agent指令及Prompt模板。";

/// Progress phrases cycled while an analysis is in flight.
pub const PROGRESS_MESSAGES: [&str; 7] = [
    "Reading visual language...",
    "Extracting lighting geometry...",
    "Analyzing compositional balance...",
    "Decoding mood and atmosphere...",
    "Synthesizing generation prompts...",
    "Applying anti-artifact logic...",
    "Finalizing style specs...",
];

/// Progress label before the first phrase is shown.
pub const INITIAL_PROGRESS: &str = "Initializing analysis...";

/// Interval between progress phrases.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Model and sampling settings for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Reasoning budget in tokens.
    pub thinking_budget: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_ANALYSIS_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            thinking_budget: DEFAULT_THINKING_BUDGET,
        }
    }
}

impl AnalysisConfig {
    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the reasoning budget.
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }
}

/// Builds the analysis request for a set of reference images.
pub fn build_analysis_request(images: &[UploadedImage], config: &AnalysisConfig) -> ContentRequest {
    let mut parts = Vec::with_capacity(images.len() + 2);
    parts.push(Part::text(ANALYSIS_PROMPT));
    parts.extend(images.iter().map(Part::image));
    parts.push(Part::text(ANALYSIS_CLOSING));

    ContentRequest::from_parts(parts).with_config(GenerationConfig {
        temperature: Some(config.temperature),
        thinking_config: Some(ThinkingConfig {
            thinking_budget: config.thinking_budget,
        }),
        ..GenerationConfig::default()
    })
}

/// Sends reference images to the analysis model.
pub struct StyleAnalyzer {
    provider: Arc<dyn GenerativeProvider>,
    config: AnalysisConfig,
}

impl StyleAnalyzer {
    /// Creates an analyzer with default settings.
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self::with_config(provider, AnalysisConfig::default())
    }

    /// Creates an analyzer with custom settings.
    pub fn with_config(provider: Arc<dyn GenerativeProvider>, config: AnalysisConfig) -> Self {
        Self { provider, config }
    }

    /// Returns the settings.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Returns the backend shared with other orchestrators.
    pub fn provider(&self) -> Arc<dyn GenerativeProvider> {
        Arc::clone(&self.provider)
    }

    /// Analyzes the images and returns the raw answer text.
    ///
    /// An empty answer yields [`EMPTY_RESPONSE_FALLBACK`]. Backend failures
    /// are wrapped in [`ArchitectError::Analysis`].
    pub async fn analyze(&self, images: &[UploadedImage]) -> Result<String> {
        if images.is_empty() {
            return Err(ArchitectError::InvalidRequest(
                "at least one reference image is required".into(),
            ));
        }

        let start = Instant::now();
        let request = build_analysis_request(images, &self.config);
        let response = self
            .provider
            .generate_content(&self.config.model, &request)
            .await
            .map_err(|e| ArchitectError::Analysis(Box::new(e)))?;

        let text = response.text();
        tracing::debug!(
            model = %self.config.model,
            images = images.len(),
            chars = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "style analysis complete"
        );

        if text.trim().is_empty() {
            Ok(EMPTY_RESPONSE_FALLBACK.to_string())
        } else {
            Ok(text)
        }
    }
}

/// Cycles [`PROGRESS_MESSAGES`] on a watch channel until dropped.
///
/// The background task is aborted when the ticker is dropped, so holding it
/// across the awaited call stops it on success and failure alike.
#[must_use = "the ticker stops as soon as it is dropped"]
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Starts publishing progress phrases to `sender`.
    pub fn start(sender: Arc<watch::Sender<String>>) -> Self {
        Self::with_interval(sender, PROGRESS_INTERVAL)
    }

    /// Starts publishing with a custom interval.
    pub fn with_interval(sender: Arc<watch::Sender<String>>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            let mut index = 0;
            loop {
                ticker.tick().await;
                index = (index + 1) % PROGRESS_MESSAGES.len();
                sender.send_replace(PROGRESS_MESSAGES[index].to_string());
            }
        });
        Self { handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
