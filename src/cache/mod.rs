//! Read-through response cache. The store is a narrow port so a shared
//! backend can replace the in-memory map without touching the middleware;
//! every operation is best-effort and a broken store degrades to
//! always-miss.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Key prefix grouping all entries invalidated together on a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Analytics,
    Categories,
    Transactions,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Analytics => "analytics",
            Namespace::Categories => "categories",
            Namespace::Transactions => "transactions",
        }
    }
}

/// Deterministic key: entity namespace, requesting user, request path,
/// normalized query. The query string is normalized by sorting its `k=v`
/// pairs so parameter order never splits the cache.
pub fn cache_key(ns: Namespace, user: Option<Uuid>, path: &str, raw_query: &str) -> String {
    let mut pairs: Vec<&str> = raw_query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    let scope = user.map(|u| u.to_string()).unwrap_or_else(|| "global".to_string());
    format!("fintrack:{}:{}:{}?{}", ns.as_str(), scope, path, pairs.join("&"))
}

/// Prefix covering every cached read in `ns` for `user`.
pub fn user_prefix(ns: Namespace, user: Uuid) -> String {
    format!("fintrack:{}:{}:", ns.as_str(), user)
}

/// Prefix covering the globally shared entries in `ns`.
pub fn global_prefix(ns: Namespace) -> String {
    format!("fintrack:{}:", ns.as_str())
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
    async fn invalidate_prefix(&self, prefix: &str);
}

/// Process-local store. Entries are pruned lazily: expired values are
/// treated as misses on read and swept on write.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    expires_at: Instant,
    body: Vec<u8>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.body.clone())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(key.to_string(), CacheEntry { expires_at: now + ttl, body: value });
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(prefix = %prefix, removed, "cache invalidated");
        }
    }
}
