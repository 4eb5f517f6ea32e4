use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;
use utoipa::ToSchema;

use crate::extractor::AiEnhancedContent;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Stores enhancement results keyed by source URL and, optionally, the raw
/// content they were computed from. A miss is never an error.
pub trait AiCache: Send + Sync {
    fn get(&self, url: &str, content: Option<&str>) -> Option<AiEnhancedContent>;

    fn set(&self, url: &str, content: Option<&str>, value: AiEnhancedContent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    value: AiEnhancedContent,
    created_at: Instant,
    expires_at: Instant,
}

/// In-process cache with TTL expiry and oldest-first eviction at capacity.
#[derive(Debug)]
pub struct MemoryAiCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for MemoryAiCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

/// `md5(url)[..8] + "_" + md5(content)[..8]`; the content half is empty when absent.
pub fn cache_key(url: &str, content: Option<&str>) -> String {
    let url_hash = short_hash(url);
    let content_hash = content.map(short_hash).unwrap_or_default();
    format!("{url_hash}_{content_hash}")
}

fn short_hash(input: &str) -> String {
    let digest = format!("{:x}", md5::compute(input.as_bytes()));
    digest[..8].to_string()
}

impl MemoryAiCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let expired_entries = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .count();
        let total_entries = self.entries.len();

        CacheStats {
            total_entries,
            valid_entries: total_entries.saturating_sub(expired_entries),
            expired_entries,
            max_entries: self.max_entries,
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops every entry whose source URL starts with `prefix`; returns how many went.
    pub fn remove_by_url_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.url.starts_with(prefix));
        before - self.entries.len()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired AI cache entries");
        }
        removed
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

impl AiCache for MemoryAiCache {
    fn get(&self, url: &str, content: Option<&str>) -> Option<AiEnhancedContent> {
        let key = cache_key(url, content);
        let now = Instant::now();

        let hit = self.entries.get(&key).map(|entry| {
            if entry.expires_at > now {
                Some(entry.value.clone())
            } else {
                None
            }
        })?;

        if hit.is_none() {
            self.entries.remove(&key);
        }
        hit
    }

    fn set(&self, url: &str, content: Option<&str>, value: AiEnhancedContent) {
        let key = cache_key(url, content);
        if !self.entries.contains_key(&key) {
            self.purge_expired();
            while self.entries.len() >= self.max_entries {
                self.evict_oldest();
            }
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                url: url.to_string(),
                value,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
    }
}
