//! Language model abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProviderError, ProviderResult};

/// Which language model service plans the scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageModelKind {
    #[default]
    Gemini,
    Claude,
}

impl LanguageModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageModelKind::Gemini => "gemini",
            LanguageModelKind::Claude => "claude",
        }
    }
}

impl fmt::Display for LanguageModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LanguageModelKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(LanguageModelKind::Gemini),
            "claude" | "anthropic" => Ok(LanguageModelKind::Claude),
            other => Err(ProviderError::config(format!("unknown language model: {}", other))),
        }
    }
}

/// Expected shape of the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
}

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub format: ResponseFormat,
}

impl CompletionRequest {
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            format: ResponseFormat::Json,
        }
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            format: ResponseFormat::Text,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// A service that completes prompts.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Return the raw completion text.
    ///
    /// For JSON requests, markdown code fences are already removed.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;
}

/// Remove a surrounding ```json ... ``` fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening line
    let body = match rest.split_once('\n') {
        Some((tag, body)) if !tag.trim().contains(char::is_whitespace) => body,
        _ => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
