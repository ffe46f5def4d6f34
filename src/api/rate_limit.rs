use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sliding-window request counter keyed by client identity. A `VecDeque` of
/// hit timestamps per key gives O(1) amortized admission and O(window)
/// pruning; wrapped in a `tokio::sync::Mutex` since handlers share one map
/// across concurrent requests.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_seconds: u64) -> Self {
        Self { limit: limit.max(1) as usize, window: Duration::from_secs(window_seconds.max(1)), hits: Mutex::new(HashMap::new()) }
    }

    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        let bucket = hits.entry(key.to_string()).or_default();

        while let Some(&front) = bucket.front() {
            if now.duration_since(front) > self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }

        if bucket.len() >= self.limit {
            return false;
        }
        bucket.push_back(now);
        true
    }
}
