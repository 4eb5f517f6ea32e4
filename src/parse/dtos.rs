use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    ai::AiOptions,
    errors::{ErrorCategory, ExtractError, StrategyFailure},
    extractor::{AiEnhancedContent, ExtractionOptions, Platform},
    formatter::OutputFormat,
    share_text::{ShareTextError, find_share_url},
};

pub const URL_REQUIRED: &str = "URL is required and must be a string";
pub const INVALID_FORMAT: &str = "Invalid output_format. Must be one of: flomo, notes, raw";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ParseRequest {
    /// A URL or pasted share text containing one.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub options: ExtractionOptions,
    #[serde(default)]
    pub ai_enhance: bool,
    #[serde(default)]
    pub ai_options: AiOptions,
}

impl ParseRequest {
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        match self.output_format.as_deref() {
            None => Ok(OutputFormat::default()),
            Some(raw) => raw.parse().map_err(|_| INVALID_FORMAT.to_string()),
        }
    }

    /// The URL to extract. Share text from an unrecognised site still yields
    /// its first URL, which the generic extractor handles.
    pub fn target_url(&self) -> Result<String, String> {
        match find_share_url(&self.url) {
            Ok(url) | Err(ShareTextError::Unsupported(url)) => Ok(url),
            Err(ShareTextError::NoUrl) => Err(URL_REQUIRED.to_string()),
        }
    }
}

/// Structured detail on a failed extraction.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParseFallback {
    pub category: ErrorCategory,
    pub attempts: Vec<StrategyFailure>,
}

impl From<&ExtractError> for ParseFallback {
    fn from(err: &ExtractError) -> Self {
        Self {
            category: err.category(),
            attempts: err.failures(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ParseResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AiEnhancedContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_url: Option<String>,
    pub parsed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ParseFallback>,
}

impl ParseResponse {
    pub fn success(data: AiEnhancedContent, ios_url: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            ios_url,
            parsed_at: Utc::now(),
            error: None,
            fallback: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            ios_url: None,
            parsed_at: Utc::now(),
            error: Some(error.into()),
            fallback: None,
        }
    }

    pub fn from_error(err: &ExtractError) -> Self {
        Self {
            fallback: Some(ParseFallback::from(err)),
            ..Self::failure(err.user_message())
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub supported_platforms: Vec<Platform>,
    pub output_formats: Vec<OutputFormat>,
    pub ai_available: bool,
    pub smart_ai_platforms: Vec<Platform>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ParseRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let req = request(serde_json::json!({"url": "https://example.com/a"}));
        assert_eq!(req.output_format().unwrap(), OutputFormat::Flomo);
        assert!(!req.ai_enhance);
        assert_eq!(req.ai_options, AiOptions::all());
        assert_eq!(req.target_url().unwrap(), "https://example.com/a");
    }

    #[test]
    fn test_invalid_format_and_missing_url() {
        let req = request(serde_json::json!({"url": "", "output_format": "markdown"}));
        assert_eq!(req.output_format().unwrap_err(), INVALID_FORMAT);
        assert_eq!(req.target_url().unwrap_err(), URL_REQUIRED);
    }

    #[test]
    fn test_share_text_is_reduced_to_its_url() {
        let req = request(serde_json::json!({
            "url": "【周末去哪儿】 https://www.xiaohongshu.com/explore/64f1a2b3 复制本条信息，打开小红书App查看",
        }));
        assert_eq!(
            req.target_url().unwrap(),
            "https://www.xiaohongshu.com/explore/64f1a2b3"
        );

        let req = request(serde_json::json!({"url": "看这篇 https://blog.example.com/p/1 不错"}));
        assert_eq!(req.target_url().unwrap(), "https://blog.example.com/p/1");
    }

    #[test]
    fn test_failure_envelope_carries_attempts() {
        let err = ExtractError::AllStrategiesFailed {
            attempts: vec![StrategyFailure {
                strategy: "generic".into(),
                category: ErrorCategory::Network,
                message: "connection reset".into(),
            }],
        };
        let json = serde_json::to_value(ParseResponse::from_error(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["fallback"]["attempts"][0]["strategy"], "generic");
        assert!(json["error"].as_str().unwrap().contains("generic"));
    }
}
