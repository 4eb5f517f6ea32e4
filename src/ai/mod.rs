pub mod cache;
pub mod extractor;
pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use cache::{AiCache, MemoryAiCache};
pub use extractor::AiExtractor;
pub use openai::OpenAiCompatClient;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("ai unavailable: {0}")]
    Unavailable(String),

    #[error("ai transport error: {0}")]
    Transport(String),

    #[error("ai request timed out")]
    Timeout,

    #[error("ai provider rate limited the request")]
    RateLimited,

    #[error("ai response did not match the expected schema: {0}")]
    Schema(String),

    #[error("ai provider declined the request: {0}")]
    Declined(String),
}

impl AiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::RateLimited)
    }
}

/// Fields the model pulled out of raw HTML. Only `images` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtraction {
    pub title: Option<String>,
    #[serde(alias = "body")]
    pub content: Option<String>,
    pub images: Vec<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    pub content_type: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Which enhancement sub-tasks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AiOptions {
    #[serde(alias = "enable_summary")]
    pub enable_summary: bool,
    #[serde(alias = "enable_title_optimization")]
    pub enable_title_optimization: bool,
    #[serde(alias = "enable_categorization")]
    pub enable_categorization: bool,
}

impl Default for AiOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl AiOptions {
    pub const fn all() -> Self {
        Self {
            enable_summary: true,
            enable_title_optimization: true,
            enable_categorization: true,
        }
    }

    pub fn any(&self) -> bool {
        self.enable_summary || self.enable_title_optimization || self.enable_categorization
    }

    /// Tags cached enhancements with the tasks that produced them.
    pub fn cache_scope(&self) -> String {
        let flag = |on: bool| if on { '1' } else { '0' };
        format!(
            "enhance:{}{}{}",
            flag(self.enable_summary),
            flag(self.enable_title_optimization),
            flag(self.enable_categorization)
        )
    }
}

/// A language-model backend. Each call is one prompt round-trip; retries
/// belong to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiClient: Send + Sync {
    fn is_available(&self) -> bool;

    async fn summarize(&self, text: &str) -> Result<String, AiError>;

    async fn optimize_title(&self, title: &str, text: &str) -> Result<String, AiError>;

    async fn categorize(&self, text: &str) -> Result<Categorization, AiError>;

    async fn extract_structured(&self, html: &str, url: &str) -> Result<RawExtraction, AiError>;
}

/// Stand-in used when no API key is configured or AI is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAiClient;

#[async_trait]
impl AiClient for DisabledAiClient {
    fn is_available(&self) -> bool {
        false
    }

    async fn summarize(&self, _text: &str) -> Result<String, AiError> {
        Err(disabled())
    }

    async fn optimize_title(&self, _title: &str, _text: &str) -> Result<String, AiError> {
        Err(disabled())
    }

    async fn categorize(&self, _text: &str) -> Result<Categorization, AiError> {
        Err(disabled())
    }

    async fn extract_structured(&self, _html: &str, _url: &str) -> Result<RawExtraction, AiError> {
        Err(disabled())
    }
}

fn disabled() -> AiError {
    AiError::Unavailable("no language model configured".into())
}

/// Pulls the JSON object out of a model reply that may wrap it in a code fence or prose.
pub fn json_payload(reply: &str) -> &str {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}
