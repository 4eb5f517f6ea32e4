//! Configuration handling for the service.
//!
//! Everything is read once in [`Config::from_env`] with development defaults;
//! deeper layers receive plain values or capability flags and never look at
//! the process environment themselves.

pub mod environment;

use std::{env, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

use crate::{
    ai::{
        cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL},
        openai::{DEFAULT_AI_TIMEOUT, DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiConfig},
    },
    extractor::{Platform, model::DEFAULT_TIMEOUT_MS},
};

pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_LLM_API_KEY: &str = "LLM_API_KEY";
pub const ENV_LLM_API_BASE_URL: &str = "LLM_API_BASE_URL";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ENABLE_AI: &str = "ENABLE_AI";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";
pub const ENV_AI_TIMEOUT_MS: &str = "AI_TIMEOUT_MS";
pub const ENV_AI_CACHE_TTL_HOURS: &str = "AI_CACHE_TTL_HOURS";
pub const ENV_AI_CACHE_MAX_ENTRIES: &str = "AI_CACHE_MAX_ENTRIES";
pub const ENV_SMART_AI_PLATFORMS: &str = "SMART_AI_PLATFORMS";
pub const ENV_RATE_LIMIT_MAX_REQUESTS: &str = "RATE_LIMIT_MAX_REQUESTS";
pub const ENV_RATE_LIMIT_WINDOW_SECS: &str = "RATE_LIMIT_WINDOW_SECS";
pub const ENV_CHROME_PATH: &str = "CHROME_PATH";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SMART_AI_PLATFORMS: &[Platform] = &[Platform::Xiaohongshu];
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    bind_addr: String,
    llm: Option<OpenAiConfig>,
    request_timeout: Duration,
    ai_cache_ttl: Duration,
    ai_cache_max_entries: usize,
    smart_ai_platforms: Vec<Platform>,
    rate_limit_max_requests: u32,
    rate_limit_window_secs: i64,
    chrome_executable: Option<PathBuf>,
    json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            llm: None,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            ai_cache_ttl: DEFAULT_TTL,
            ai_cache_max_entries: DEFAULT_MAX_ENTRIES,
            smart_ai_platforms: DEFAULT_SMART_AI_PLATFORMS.to_vec(),
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            chrome_executable: None,
            json_logs: false,
        }
    }
}

impl Config {
    /// Load from environment variables, falling back to development defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env_string(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let ai_timeout = env_parsed::<u64>(ENV_AI_TIMEOUT_MS)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_AI_TIMEOUT);
        let ai_enabled = env_string(ENV_ENABLE_AI).is_none_or(|v| !v.eq_ignore_ascii_case("false"));
        let llm = ai_enabled.then(|| llm_from_env(ai_timeout)).flatten();

        let request_timeout = Duration::from_millis(
            env_parsed::<u64>(ENV_REQUEST_TIMEOUT_MS)?.unwrap_or(DEFAULT_TIMEOUT_MS),
        );
        let ai_cache_ttl = env_parsed::<u64>(ENV_AI_CACHE_TTL_HOURS)?
            .map(|hours| Duration::from_secs(hours * 60 * 60))
            .unwrap_or(DEFAULT_TTL);
        let ai_cache_max_entries =
            env_parsed::<usize>(ENV_AI_CACHE_MAX_ENTRIES)?.unwrap_or(DEFAULT_MAX_ENTRIES);

        let smart_ai_platforms = match env_string(ENV_SMART_AI_PLATFORMS) {
            Some(list) => parse_platform_list(&list)?,
            None => DEFAULT_SMART_AI_PLATFORMS.to_vec(),
        };

        let rate_limit_max_requests = env_parsed::<u32>(ENV_RATE_LIMIT_MAX_REQUESTS)?
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
        let rate_limit_window_secs = env_parsed::<i64>(ENV_RATE_LIMIT_WINDOW_SECS)?
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
        if rate_limit_window_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_RATE_LIMIT_WINDOW_SECS,
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            bind_addr,
            llm,
            request_timeout,
            ai_cache_ttl,
            ai_cache_max_entries,
            smart_ai_platforms,
            rate_limit_max_requests,
            rate_limit_window_secs,
            chrome_executable: env_string(ENV_CHROME_PATH).map(PathBuf::from),
            json_logs: env_string(ENV_LOG_FORMAT).is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// TCP bind address (host:port) for the HTTP server.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }
    /// Language-model connection; `None` when AI is disabled or no key is set.
    pub fn llm(&self) -> Option<&OpenAiConfig> {
        self.llm.as_ref()
    }
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
    pub fn ai_cache_ttl(&self) -> Duration {
        self.ai_cache_ttl
    }
    pub fn ai_cache_max_entries(&self) -> usize {
        self.ai_cache_max_entries
    }
    /// Platforms routed through AI first in smart mode.
    pub fn smart_ai_platforms(&self) -> &[Platform] {
        &self.smart_ai_platforms
    }
    pub fn rate_limit_max_requests(&self) -> u32 {
        self.rate_limit_max_requests
    }
    pub fn rate_limit_window_secs(&self) -> i64 {
        self.rate_limit_window_secs
    }
    pub fn chrome_executable(&self) -> Option<&PathBuf> {
        self.chrome_executable.as_ref()
    }
    pub fn json_logs(&self) -> bool {
        self.json_logs
    }

    pub fn with_llm(mut self, llm: Option<OpenAiConfig>) -> Self {
        self.llm = llm;
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                field: key,
                reason: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

fn llm_from_env(timeout: Duration) -> Option<OpenAiConfig> {
    let (api_key, base_url, model) = match env_string(ENV_LLM_API_KEY) {
        Some(key) => (
            key,
            env_string(ENV_LLM_API_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            env_string(ENV_LLM_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        ),
        None => (
            env_string(ENV_OPENAI_API_KEY)?,
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_MODEL.to_string(),
        ),
    };

    Some(OpenAiConfig {
        api_key,
        base_url,
        model,
        timeout,
    })
}

fn parse_platform_list(list: &str) -> Result<Vec<Platform>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<Platform>().map_err(|reason| ConfigError::InvalidValue {
                field: ENV_SMART_AI_PLATFORMS,
                reason,
            })
        })
        .collect()
}

/// Errors that can occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
