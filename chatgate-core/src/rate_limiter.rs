use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::Mutex;

/// Sliding-window admission control keyed by user id.
///
/// A `max` of zero or less disables limiting entirely.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: i64,
    windows: Mutex<HashMap<i64, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: i64) -> Self {
        Self {
            window,
            max,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(max: i64) -> Self {
        Self::new(Duration::from_secs(60), max)
    }

    pub fn is_disabled(&self) -> bool {
        self.max <= 0
    }

    pub fn allow(&self, user_id: i64) -> bool {
        self.allow_at(user_id, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    ///
    /// Rejected calls are not recorded, so a user that keeps retrying does
    /// not extend its own lockout.
    pub fn allow_at(&self, user_id: i64, now: Instant) -> bool {
        if self.is_disabled() {
            return true;
        }

        let mut windows = self.windows.lock();
        let stamps = windows.entry(user_id).or_default();
        if let Some(cutoff) = now.checked_sub(self.window) {
            while stamps.front().is_some_and(|stamp| *stamp <= cutoff) {
                stamps.pop_front();
            }
        }

        let max = usize::try_from(self.max).unwrap_or(usize::MAX);
        if stamps.len() >= max {
            return false;
        }
        stamps.push_back(now);
        true
    }
}
