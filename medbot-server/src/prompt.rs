use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const MEDICAL_RULES: &str = r#"You are a professional medical assistant chatbot. Your role is to provide accurate, responsible, and relevant information only related to healthcare, symptoms, diseases, medications, treatments, and medical conditions.

Rules you must follow:
1. Do not answer questions unrelated to medicine, health, or the human body.
2. Provide commonly used over-the-counter medicine suggestions, including dosage, only when symptoms are mild.
3. Always include safety notes and advise seeing a licensed doctor for severe or unclear symptoms.
4. Avoid giving specific prescriptions or dosages unless they're standard and over-the-counter.
5. Warn users against self-diagnosis or skipping professional consultations.
6. Be empathetic, professional, and concise in responses.
7. Do not engage in jokes, politics, or non-health-related queries.

Always act as a medical assistant only, nothing else.

Always format your response using Markdown. Use:

- `**` for bold
- `-` for bullet points
- `###` for section headers
- `\n` to separate lines
"#;

/// Behavioral rules sent ahead of every user message. Loaded once, shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemPrompt(Arc<str>);

impl SystemPrompt {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Reads the prompt from `path` if given, otherwise uses the built-in rules.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
        if text.trim().is_empty() {
            bail!("System prompt file {} is empty", path.display());
        }

        info!("Loaded system prompt from {} ({} bytes)", path.display(), text.len());
        Ok(Self::new(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(MEDICAL_RULES)
    }
}

impl fmt::Display for SystemPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
