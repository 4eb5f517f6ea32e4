use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::{
    ai::{
        AiClient, AiError, Categorization, RawExtraction, json_payload,
        prompts::{self, render},
    },
    extractor::cleaner::char_prefix,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);

const SUMMARY_INPUT_CHARS: usize = 4000;
const TITLE_INPUT_CHARS: usize = 500;
const CATEGORIZE_INPUT_CHARS: usize = 1000;
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.1;

/// Connection settings for an OpenAI-compatible provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_AI_TIMEOUT,
        }
    }

    /// Providers are configured either with a bare host or with the `/v1` prefix.
    pub fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Talks to any `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Unavailable(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, &detail));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Schema(format!("completion body: {e}")))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AiError::Declined("empty completion".into()))?;

        debug!(chars = reply.chars().count(), "Model replied");
        Ok(reply)
    }
}

fn transport_error(err: reqwest::Error) -> AiError {
    if err.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Transport(err.to_string())
    }
}

fn status_error(status: StatusCode, detail: &str) -> AiError {
    let detail = char_prefix(detail, 200);
    match status {
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AiError::Timeout,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AiError::Unavailable(format!("provider rejected credentials ({status})"))
        }
        s if s.is_server_error() => AiError::Transport(format!("{status}: {detail}")),
        _ => AiError::Declined(format!("{status}: {detail}")),
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(reply: &str) -> Result<T, AiError> {
    serde_json::from_str(json_payload(reply)).map_err(|e| {
        warn!(error = %e, "Model reply did not match the expected JSON shape");
        AiError::Schema(e.to_string())
    })
}

#[async_trait]
impl AiClient for OpenAiCompatClient {
    fn is_available(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn summarize(&self, text: &str) -> Result<String, AiError> {
        let prompt = render(
            prompts::SUMMARIZE,
            &[("content", char_prefix(text, SUMMARY_INPUT_CHARS))],
        );
        self.complete(&prompt).await
    }

    async fn optimize_title(&self, title: &str, text: &str) -> Result<String, AiError> {
        let prompt = render(
            prompts::OPTIMIZE_TITLE,
            &[("title", title), ("content", char_prefix(text, TITLE_INPUT_CHARS))],
        );
        let reply = self.complete(&prompt).await?;
        Ok(reply
            .trim_matches(|c: char| c == '"' || c == '“' || c == '”' || c == '《' || c == '》')
            .trim()
            .to_string())
    }

    async fn categorize(&self, text: &str) -> Result<Categorization, AiError> {
        let prompt = render(
            prompts::CATEGORIZE,
            &[("content", char_prefix(text, CATEGORIZE_INPUT_CHARS))],
        );
        let reply = self.complete(&prompt).await?;
        parse_json(&reply)
    }

    async fn extract_structured(&self, html: &str, url: &str) -> Result<RawExtraction, AiError> {
        let prompt = render(prompts::EXTRACT_HTML, &[("html", html), ("url", url)]);
        let reply = self.complete(&prompt).await?;
        parse_json(&reply)
    }
}
