//! Sliding-window rate limiter
//!
//! Two windows are tracked:
//! - failed logins per username (5 per 15 minutes)
//! - requests per client IP (10 per minute), shared by login and the public forms

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

const USERNAME_LIMIT: usize = 5;
const USERNAME_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

struct Window<K> {
    limit: usize,
    span: Duration,
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> Window<K> {
    fn new(limit: usize, span: Duration) -> Self {
        Self {
            limit,
            span,
            hits: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.span;
        let mut hits = self.hits.write().await;
        let entry = hits.entry(key).or_default();
        entry.retain(|t| *t > cutoff);
        entry.len() >= self.limit
    }

    /// Count a hit unless the key is already at its limit. Returns `true` when limited.
    async fn hit(&self, key: K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.span;
        let mut hits = self.hits.write().await;
        let entry = hits.entry(key).or_default();
        entry.retain(|t| *t > cutoff);
        if entry.len() >= self.limit {
            return true;
        }
        entry.push(now);
        false
    }

    async fn record(&self, key: K, now: DateTime<Utc>) {
        self.hits.write().await.entry(key).or_default().push(now);
    }

    async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    async fn cleanup(&self, now: DateTime<Utc>) {
        let cutoff = now - self.span;
        self.hits.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    async fn len(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Shared limiter for login attempts and form submissions
pub struct RateLimiter {
    usernames: Window<String>,
    ips: Window<IpAddr>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            usernames: Window::new(USERNAME_LIMIT, Duration::minutes(USERNAME_WINDOW_MINUTES)),
            ips: Window::new(IP_LIMIT, Duration::minutes(IP_WINDOW_MINUTES)),
        }
    }

    /// Usernames are compared case-insensitively.
    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames
            .is_limited(username.to_lowercase(), Utc::now())
            .await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase(), Utc::now()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    /// Check and record under one lock. Returns `true` when the request must be rejected.
    pub async fn check_ip(&self, ip: IpAddr) -> bool {
        self.ips.hit(ip, Utc::now()).await
    }

    /// Drop stale entries; run periodically
    pub async fn cleanup(&self) {
        let now = Utc::now();
        self.usernames.cleanup(now).await;
        self.ips.cleanup(now).await;
    }

    /// Number of tracked keys (usernames, ips)
    pub async fn tracked(&self) -> (usize, usize) {
        (self.usernames.len().await, self.ips.len().await)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..4 {
            assert!(!limiter.is_username_limited("admin").await);
            limiter.record_failed_attempt("admin").await;
        }
        limiter.record_failed_attempt("admin").await;
        assert!(limiter.is_username_limited("admin").await);

        limiter.clear_username_attempts("admin").await;
        assert!(!limiter.is_username_limited("admin").await);
    }

    #[tokio::test]
    async fn test_username_case_insensitive() {
        let limiter = RateLimiter::new();
        for name in ["Admin", "ADMIN", "admin", "aDmin", "admiN"] {
            limiter.record_failed_attempt(name).await;
        }
        assert!(limiter.is_username_limited("admin").await);
    }

    #[tokio::test]
    async fn test_check_ip() {
        let limiter = RateLimiter::new();
        let ip = IpAddr::from_str("192.0.2.1").unwrap();
        for _ in 0..10 {
            assert!(!limiter.check_ip(ip).await);
        }
        assert!(limiter.check_ip(ip).await);

        let other = IpAddr::from_str("192.0.2.2").unwrap();
        assert!(!limiter.check_ip(other).await);
    }

    #[tokio::test]
    async fn test_check_ip_concurrent() {
        let limiter = std::sync::Arc::new(RateLimiter::new());
        let ip = IpAddr::from_str("192.0.2.7").unwrap();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..25 {
            let limiter = limiter.clone();
            tasks.spawn(async move { limiter.check_ip(ip).await });
        }
        let mut accepted = 0;
        while let Some(limited) = tasks.join_next().await {
            if !limited.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, IP_LIMIT);
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let window: Window<&str> = Window::new(2, Duration::minutes(1));
        let past = Utc::now() - Duration::minutes(5);
        window.record("k", past).await;
        window.record("k", past).await;
        assert!(!window.is_limited("k", Utc::now()).await);

        window.cleanup(Utc::now()).await;
        assert_eq!(window.len().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent() {
        let limiter = RateLimiter::new();
        limiter.record_failed_attempt("editor").await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, (1, 0));
    }
}
