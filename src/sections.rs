//! Splits an analysis answer into its labeled prompt sections.
//!
//! The model is asked to answer under three `###` headings, but it is free
//! text: a heading may be reworded, translated or missing. Each section is
//! therefore looked up through an ordered list of labels, and a section that
//! matches none of them is simply empty.

use regex::RegexBuilder;
use serde::Serialize;

/// Marker that starts the next section heading.
pub const SECTION_MARKER: &str = "###";

/// Shown in place of a section that could not be found.
pub const UNPARSED_PLACEHOLDER: &str = "Parsing content...";

/// The three sections of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Instructions for an image-generation agent.
    SystemPrompt,
    /// What the generated image should contain.
    PositivePrompt,
    /// What the generated image should avoid.
    NegativePrompt,
}

impl SectionKind {
    /// All sections in display order.
    pub const ALL: [SectionKind; 3] = [
        SectionKind::SystemPrompt,
        SectionKind::PositivePrompt,
        SectionKind::NegativePrompt,
    ];

    /// Display title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::SystemPrompt => "Agent System Prompt",
            Self::PositivePrompt => "Positive Prompt",
            Self::NegativePrompt => "Negative Prompt",
        }
    }

    /// Short identifier (`sys`, `pos`, `neg`).
    pub fn id(&self) -> &'static str {
        match self {
            Self::SystemPrompt => "sys",
            Self::PositivePrompt => "pos",
            Self::NegativePrompt => "neg",
        }
    }
}

/// Ordered heading labels for each section. Earlier labels win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLabels {
    /// Labels for the system-prompt section.
    pub system: Vec<String>,
    /// Labels for the positive-prompt section.
    pub positive: Vec<String>,
    /// Labels for the negative-prompt section.
    pub negative: Vec<String>,
}

impl Default for SectionLabels {
    fn default() -> Self {
        Self {
            system: labels(&["1. Agent 系统设定", "Agent 系统设定", "System Prompt"]),
            positive: labels(&["2. 正向提示词", "生图指令模板", "Positive Prompt"]),
            negative: labels(&["3. 负向提示词", "Negative Prompt"]),
        }
    }
}

impl SectionLabels {
    /// Creates a label set with one label per section.
    pub fn single(system: &str, positive: &str, negative: &str) -> Self {
        Self {
            system: labels(&[system]),
            positive: labels(&[positive]),
            negative: labels(&[negative]),
        }
    }

    /// Returns the labels for a section.
    pub fn for_kind(&self, kind: SectionKind) -> &[String] {
        match kind {
            SectionKind::SystemPrompt => &self.system,
            SectionKind::PositivePrompt => &self.positive,
            SectionKind::NegativePrompt => &self.negative,
        }
    }
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Returns the trimmed text following `label` up to the next `###` or the end.
///
/// Matching is case-insensitive. Returns an empty string when the label does
/// not occur.
pub fn extract_section(raw: &str, label: &str) -> String {
    let pattern = format!(r"{}\s*([\s\S]*?)(?:{}|\z)", regex::escape(label), SECTION_MARKER);
    let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
        return String::new();
    };

    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Returns the first non-empty section among `labels`, tried in order.
pub fn extract_first<S: AsRef<str>>(raw: &str, labels: &[S]) -> String {
    labels
        .iter()
        .map(|label| extract_section(raw, label.as_ref()))
        .find(|section| !section.is_empty())
        .unwrap_or_default()
}

/// The sections found in one analysis answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedSections {
    /// Agent system prompt.
    pub system_prompt: String,
    /// Positive prompt; required for image generation.
    pub positive_prompt: String,
    /// Negative prompt.
    pub negative_prompt: String,
}

impl ExtractedSections {
    /// Extracts all three sections using the default labels.
    pub fn parse(raw: &str) -> Self {
        Self::with_labels(raw, &SectionLabels::default())
    }

    /// Extracts all three sections using custom labels.
    pub fn with_labels(raw: &str, labels: &SectionLabels) -> Self {
        Self {
            system_prompt: extract_first(raw, &labels.system),
            positive_prompt: extract_first(raw, &labels.positive),
            negative_prompt: extract_first(raw, &labels.negative),
        }
    }

    /// Returns one section.
    pub fn section(&self, kind: SectionKind) -> &str {
        match kind {
            SectionKind::SystemPrompt => &self.system_prompt,
            SectionKind::PositivePrompt => &self.positive_prompt,
            SectionKind::NegativePrompt => &self.negative_prompt,
        }
    }

    /// Returns a section for display, marking empty ones as unparsed.
    pub fn display(&self, kind: SectionKind) -> &str {
        let text = self.section(kind);
        if text.is_empty() {
            UNPARSED_PLACEHOLDER
        } else {
            text
        }
    }

    /// Returns the sections that could not be found.
    pub fn missing(&self) -> Vec<SectionKind> {
        SectionKind::ALL
            .into_iter()
            .filter(|kind| self.section(*kind).is_empty())
            .collect()
    }

    /// Returns true when the positive prompt is present, which generation requires.
    pub fn is_generation_ready(&self) -> bool {
        !self.positive_prompt.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = "\
Here is the breakdown.

### 1. Agent 系统设定 (System Prompt)
You are a product photographer.

### 2. 正向提示词 (Positive Prompt)
soft window light, linen backdrop, 35mm

### 3. 负向提示词 (Negative Prompt)
blurry, extra fingers
";

    #[test]
    fn test_english_scenario() {
        let raw = "### 1. System\nfoo\n### 2. Positive\nbar\n### 3. Negative\nbaz";
        let labels = SectionLabels::single("1. System", "2. Positive", "3. Negative");
        let sections = ExtractedSections::with_labels(raw, &labels);

        assert_eq!(sections.system_prompt, "foo");
        assert_eq!(sections.positive_prompt, "bar");
        assert_eq!(sections.negative_prompt, "baz");
    }

    #[test]
    fn test_default_labels_on_bilingual_answer() {
        let sections = ExtractedSections::parse(ANSWER);
        // the parenthesized English title is part of the captured text
        assert_eq!(
            sections.system_prompt,
            "(System Prompt)\nYou are a product photographer."
        );
        assert!(sections.positive_prompt.ends_with("soft window light, linen backdrop, 35mm"));
        assert!(sections.negative_prompt.ends_with("blurry, extra fingers"));
        assert!(sections.is_generation_ready());
        assert!(sections.missing().is_empty());
    }

    #[test]
    fn test_primary_label_wins_over_fallback() {
        let raw = "### Positive Prompt\nfallback text\n### 2. 正向提示词\nprimary text\n";
        let sections = ExtractedSections::parse(raw);
        assert_eq!(sections.positive_prompt, "primary text");
    }

    #[test]
    fn test_fallback_used_when_primary_missing() {
        let raw = "### Negative Prompt\nno watermark";
        assert_eq!(ExtractedSections::parse(raw).negative_prompt, "no watermark");
    }

    #[test]
    fn test_empty_primary_falls_through() {
        // primary heading present but immediately followed by the next heading
        let raw = "### 3. 负向提示词\n### Negative Prompt\nlow contrast";
        assert_eq!(ExtractedSections::parse(raw).negative_prompt, "low contrast");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(extract_section("### POSITIVE PROMPT\nneon", "positive prompt"), "neon");
    }

    #[test]
    fn test_label_is_literal_not_pattern() {
        // "." must not match arbitrary characters
        assert_eq!(extract_section("### 1x System\nfoo", "1. System"), "");
        assert_eq!(extract_section("(a+b) then text", "(a+b)"), "then text");
    }

    #[test]
    fn test_unparsed_degrades_to_empty() {
        let sections = ExtractedSections::parse("The model ignored the format entirely.");
        assert_eq!(sections, ExtractedSections::default());
        assert!(!sections.is_generation_ready());
        assert_eq!(sections.display(SectionKind::PositivePrompt), UNPARSED_PLACEHOLDER);
        assert_eq!(sections.missing(), SectionKind::ALL.to_vec());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let first = ExtractedSections::parse(ANSWER);
        let second = ExtractedSections::parse(ANSWER);
        assert_eq!(first, second);
        assert_eq!(
            extract_section(ANSWER, "2. 正向提示词"),
            extract_section(ANSWER, "2. 正向提示词")
        );
    }

    #[test]
    fn test_whitespace_only_positive_is_not_ready() {
        let sections = ExtractedSections {
            positive_prompt: "   ".into(),
            ..Default::default()
        };
        assert!(!sections.is_generation_ready());
    }

    #[test]
    fn test_section_kind_metadata() {
        assert_eq!(SectionKind::PositivePrompt.id(), "pos");
        assert_eq!(SectionKind::NegativePrompt.title(), "Negative Prompt");
        assert_eq!(
            SectionLabels::default().for_kind(SectionKind::PositivePrompt)[1],
            "生图指令模板"
        );
    }
}
