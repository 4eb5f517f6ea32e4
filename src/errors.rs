use serde::Serialize;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{ai::AiError, fetcher::FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Timeout,
    Rendering,
    AuthWall,
    Validation,
    RateLimited,
    Unknown,
}

impl ErrorCategory {
    /// Whether retrying the same strategy can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Unknown
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Rendering => "rendering",
            Self::AuthWall => "auth_wall",
            Self::Validation => "validation",
            Self::RateLimited => "rate_limited",
            Self::Unknown => "unknown",
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            Self::Network => "网络连接失败，请检查网络后重试",
            Self::Timeout => "请求超时，目标网站响应过慢，请稍后重试",
            Self::Rendering => "页面渲染失败，可在浏览器中打开页面后复制 HTML，通过 preloadedHtml 提交",
            Self::AuthWall => "该内容需要登录才能访问，可在已登录的浏览器中复制页面 HTML，通过 preloadedHtml 提交",
            Self::Validation => "链接无效或不受支持，请检查链接是否完整",
            Self::RateLimited => "请求过于频繁，请稍后再试",
            Self::Unknown => "解析失败，请稍后重试；若持续失败可通过 preloadedHtml 提交页面 HTML",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's failure inside an aggregated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StrategyFailure {
    pub strategy: String,
    pub category: ErrorCategory,
    pub message: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.strategy, self.category, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("rendering failed: {0}")]
    Rendering(String),

    #[error("login required: {0}")]
    AuthWall(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("url rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("all strategies failed: {}", join_failures(.attempts))]
    AllStrategiesFailed { attempts: Vec<StrategyFailure> },

    #[error("unknown failure: {0}")]
    Unknown(String),
}

fn join_failures(attempts: &[StrategyFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ExtractError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Rendering(_) => ErrorCategory::Rendering,
            Self::AuthWall(_) => ErrorCategory::AuthWall,
            Self::Validation(_) | Self::Rejected(_) | Self::Unavailable(_) => {
                ErrorCategory::Validation
            }
            Self::RateLimited(_) => ErrorCategory::RateLimited,
            Self::AllStrategiesFailed { attempts } => attempts
                .iter()
                .map(|a| a.category)
                .find(|c| *c != ErrorCategory::Validation)
                .or_else(|| attempts.first().map(|a| a.category))
                .unwrap_or(ErrorCategory::Unknown),
            Self::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::AllStrategiesFailed { .. }) && self.category().is_transient()
    }

    /// A message fit for end users: the category and an actionable hint, never internals.
    pub fn user_message(&self) -> String {
        let category = self.category();
        match self {
            Self::Rejected(_) => "该链接指向不允许访问的地址，仅支持公开的 http/https 链接".to_string(),
            Self::AllStrategiesFailed { attempts } => {
                let tried = attempts
                    .iter()
                    .map(|a| a.strategy.as_str())
                    .collect::<Vec<_>>()
                    .join("、");
                format!("[{category}] {}（已尝试：{tried}）", category.hint())
            }
            _ => format!("[{category}] {}", category.hint()),
        }
    }

    pub fn failures(&self) -> Vec<StrategyFailure> {
        match self {
            Self::AllStrategiesFailed { attempts } => attempts.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_failure(&self, strategy: &str) -> StrategyFailure {
        StrategyFailure {
            strategy: strategy.to_string(),
            category: self.category(),
            message: self.to_string(),
        }
    }
}

impl From<FetchError> for ExtractError {
    fn from(err: FetchError) -> Self {
        let message = err.to_string();
        if err.is_auth_wall() {
            return Self::AuthWall(message);
        }
        if err.is_gone() {
            return Self::Validation(message);
        }
        match &err {
            FetchError::RedirectBlocked(target) => Self::Rejected(target.clone()),
            FetchError::InvalidUrl(_) | FetchError::NotHtml(_) | FetchError::BodyTooLarge(_) => {
                Self::Validation(message)
            }
            FetchError::Timeout { .. } => Self::Timeout(message),
            FetchError::Status(status) if *status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                Self::RateLimited(message)
            }
            FetchError::Status(status) if status.is_server_error() => Self::Network(message),
            FetchError::Unreachable(_) | FetchError::Body(_) | FetchError::TooManyRedirects => {
                Self::Network(message)
            }
            _ => Self::Unknown(message),
        }
    }
}

impl From<AiError> for ExtractError {
    fn from(err: AiError) -> Self {
        let message = err.to_string();
        match err {
            AiError::Unavailable(_) => Self::Unavailable(message),
            AiError::Transport(_) => Self::Network(message),
            AiError::Timeout => Self::Timeout(message),
            AiError::RateLimited => Self::RateLimited(message),
            AiError::Schema(_) | AiError::Declined(_) => Self::Validation(message),
        }
    }
}
