use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AdmissionConfig;

// Storage for per-client admission timestamps (millis since epoch).
//
// `update` and `purge_expired` have read-modify-write defaults built on
// get/set/delete; stores that can do better (locks, server-side scripts)
// should override them so concurrent checks for one key don't lose writes.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<i64>>;
    fn set(&self, key: &str, timestamps: Vec<i64>);
    fn delete(&self, key: &str);
    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(&mut Vec<i64>)) {
        let mut timestamps = self.get(key).unwrap_or_default();
        f(&mut timestamps);
        self.set(key, timestamps);
    }

    // Drops every key with no timestamp newer than `cutoff_ms`, returns how many went
    fn purge_expired(&self, cutoff_ms: i64) -> usize {
        let mut removed = 0;
        for key in self.keys() {
            let live = self
                .get(&key)
                .is_some_and(|stamps| stamps.iter().any(|&t| t > cutoff_ms));
            if !live {
                self.delete(&key);
                removed += 1;
            }
        }
        removed
    }
}

// Process-local store, one DashMap shard lock per update
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<i64>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, timestamps: Vec<i64>) {
        self.entries.insert(key.to_string(), timestamps);
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(&mut Vec<i64>)) {
        let mut entry = self.entries.entry(key.to_string()).or_default();
        f(entry.value_mut());
    }

    fn purge_expired(&self, cutoff_ms: i64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, stamps| stamps.iter().any(|&t| t > cutoff_ms));
        before.saturating_sub(self.entries.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    Allowed { remaining: usize },
    // Seconds until the oldest counted request leaves the window
    Limited { retry_after_secs: u64 },
}

// Sliding-window counter: at most `cap` admissions per rolling `window` per key.
pub struct SlidingWindowLimiter {
    store: Arc<dyn RateLimitStore>,
    cap: usize,
    window_ms: i64,
    high_water: usize,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: &AdmissionConfig) -> Self {
        Self {
            store,
            cap: config.rate_limit,
            window_ms: duration_ms(config.rate_window),
            high_water: config.max_tracked_clients,
        }
    }

    pub fn check(&self, key: &str, now_ms: i64) -> WindowDecision {
        let cutoff = now_ms - self.window_ms;
        let cap = self.cap;
        let window_ms = self.window_ms;
        let mut decision = WindowDecision::Limited { retry_after_secs: 0 };

        self.store.update(key, &mut |stamps: &mut Vec<i64>| {
            stamps.retain(|&t| t > cutoff);
            if stamps.len() >= cap {
                let oldest = stamps.iter().copied().min().unwrap_or(now_ms);
                let wait_ms = (oldest + window_ms - now_ms).max(0);
                decision = WindowDecision::Limited {
                    retry_after_secs: (wait_ms as u64).div_ceil(1000).max(1),
                };
            } else {
                stamps.push(now_ms);
                decision = WindowDecision::Allowed {
                    remaining: cap - stamps.len(),
                };
            }
        });

        if self.store.len() > self.high_water {
            let removed = self.sweep(now_ms);
            tracing::debug!(removed, tracked = self.store.len(), "Swept expired rate limit keys");
        }

        decision
    }

    // Remove keys whose whole window has expired
    pub fn sweep(&self, now_ms: i64) -> usize {
        self.store.purge_expired(now_ms - self.window_ms)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

// Periodic sweep, for deployments that want it off the request path
pub async fn sweeper(limiter: Arc<SlidingWindowLimiter>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    tracing::info!(interval = ?every, "Rate limit sweeper started");

    loop {
        interval.tick().await;
        let removed = limiter.sweep(chrono::Utc::now().timestamp_millis());
        if removed > 0 {
            tracing::debug!(removed, "Background sweep dropped expired clients");
        }
        crate::metrics::TRACKED_CLIENTS.set(limiter.tracked_keys() as f64);
    }
}
