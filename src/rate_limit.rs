use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Every this many checks, buckets with no hit inside their window are dropped.
const SWEEP_EVERY: usize = 256;

#[derive(Default)]
struct Bucket {
    hits: VecDeque<Instant>,
    window: Duration,
}

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, Bucket>>,
    checks: Arc<AtomicUsize>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), checks: Arc::new(AtomicUsize::new(0)), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        // must run before the entry guard below is taken
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep();
        }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        entry.window = window;
        while let Some(front) = entry.hits.front() {
            if now.duration_since(*front) >= window { entry.hits.pop_front(); } else { break; }
        }
        if entry.hits.len() < limit {
            entry.hits.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops buckets whose newest hit has left their window.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.store
            .retain(|_, b| b.hits.back().map_or(false, |last| now.duration_since(*last) < b.window));
    }

    /// Number of buckets currently held.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// Limits applied to public form submissions.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub submit_limit: usize,
    pub submit_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { submit_limit: 20, submit_window: Duration::from_secs(60) }
    }
}

/// High level guard used by handlers.
#[derive(Clone)]
pub struct SubmissionLimiter {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl SubmissionLimiter {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }

    pub fn disabled() -> Self { Self::new(InMemoryRateLimiter::new(false), RateLimitConfig::default()) }

    /// One bucket per client and share link.
    pub fn allow_submission(&self, ip: &str, link: &str) -> bool {
        self.limiter.check(&format!("submit:{link}:{ip}"), self.cfg.submit_limit, self.cfg.submit_window)
    }
}
