use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{RateLimitConfig, RateRule};
use crate::error::ApiError;
use crate::state::AppState;

/// Route classes with independent sliding windows. The general class
/// fronts every `/api` route in addition to the class-specific limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Auth,
    Transactions,
    Analytics,
    General,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Auth => "auth",
            RouteClass::Transactions => "transactions",
            RouteClass::Analytics => "analytics",
            RouteClass::General => "general",
        }
    }

    pub fn rule(&self, config: &RateLimitConfig) -> RateRule {
        match self {
            RouteClass::Auth => config.auth,
            RouteClass::Transactions => config.transactions,
            RouteClass::Analytics => config.analytics,
            RouteClass::General => config.general,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

/// Admission check behind a trait so a shared counter store can replace
/// the in-process map for multi-instance deployments.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, key: &str, rule: RateRule) -> Decision;
}

/// Per-key timestamp queues, pruned on every check. Clients whose whole
/// window has elapsed are swept out on each check so the map does not
/// grow with every address ever seen. Counters are process-local and
/// reset on restart.
#[derive(Default)]
pub struct SlidingWindowStore {
    windows: Mutex<HashMap<String, ClientWindow>>,
}

/// Each entry carries its own window length: keys from different route
/// classes share the map, and sweeping a long-window class by a shorter
/// class's window would drop still-countable hits.
struct ClientWindow {
    window: Duration,
    hits: VecDeque<Instant>,
}

impl SlidingWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for SlidingWindowStore {
    async fn check(&self, key: &str, rule: RateRule) -> Decision {
        let window = Duration::from_secs(rule.window_secs);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        windows.retain(|_, w| {
            w.hits.back().map_or(false, |t| now.duration_since(*t) < w.window)
        });

        let entry = windows
            .entry(key.to_string())
            .or_insert_with(|| ClientWindow { window, hits: VecDeque::new() });
        entry.window = window;

        while let Some(front) = entry.hits.front() {
            if now.duration_since(*front) >= window {
                entry.hits.pop_front();
            } else {
                break;
            }
        }

        if entry.hits.len() >= rule.limit as usize {
            let oldest_age =
                entry.hits.front().map(|t| now.duration_since(*t)).unwrap_or_default();
            let retry_after = window.saturating_sub(oldest_age);
            return Decision { allowed: false, retry_after_secs: retry_after.as_secs().max(1) };
        }

        entry.hits.push_back(now);
        Decision { allowed: true, retry_after_secs: 0 }
    }
}

/// Best-effort client identity: proxy header first, then the peer address.
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        let forwarded = forwarded.trim();
        if !forwarded.is_empty() {
            return forwarded.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State((state, class)): State<(AppState, RouteClass)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.rate_limit.enabled {
        return Ok(next.run(request).await);
    }

    let rule = class.rule(&state.config.rate_limit);
    let key = format!("{}:{}", class.as_str(), client_key(&request));
    let decision = state.limiter.check(&key, rule).await;

    if !decision.allowed {
        tracing::warn!(class = class.as_str(), key = %key, "rate limit exceeded");
        return Err(ApiError::too_many_requests(format!(
            "Too many requests, retry in {} seconds",
            decision.retry_after_secs
        )));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_admits_up_to_limit() {
        let store = SlidingWindowStore::new();
        let rule = RateRule { limit: 3, window_secs: 60 };
        for _ in 0..3 {
            assert!(store.check("k", rule).await.allowed);
        }
        let denied = store.check("k", rule).await;
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs >= 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = SlidingWindowStore::new();
        let rule = RateRule { limit: 1, window_secs: 60 };
        assert!(store.check("auth:1.2.3.4", rule).await.allowed);
        assert!(store.check("auth:5.6.7.8", rule).await.allowed);
        assert!(!store.check("auth:1.2.3.4", rule).await.allowed);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let store = SlidingWindowStore::new();
        let rule = RateRule { limit: 1, window_secs: 1 };
        assert!(store.check("k", rule).await.allowed);
        assert!(!store.check("k", rule).await.allowed);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.check("k", rule).await.allowed);
    }

    #[tokio::test]
    async fn test_idle_clients_are_swept() {
        let store = SlidingWindowStore::new();
        let rule = RateRule { limit: 3, window_secs: 1 };
        store.check("general:1.2.3.4", rule).await;
        store.check("general:5.6.7.8", rule).await;
        assert_eq!(store.len().await, 2);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        store.check("general:9.9.9.9", rule).await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_active_clients() {
        let store = SlidingWindowStore::new();
        let rule = RateRule { limit: 3, window_secs: 60 };
        store.check("general:1.2.3.4", rule).await;
        store.check("general:5.6.7.8", rule).await;
        assert_eq!(store.len().await, 2);
    }
}