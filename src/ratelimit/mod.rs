//! Rate limiting and throttling.
//!
//! Sliding-window admission limiter, keyed by caller identity and independent
//! of tool identity. Occupancy is recomputed from the retained timestamps on
//! every check instead of a mutable counter, so `remaining`/`resetAt` always
//! agree with the actual call history.
//!
//! The limiter is a pure gate: it is evaluated before any resolution or
//! execution work begins, and a rejected call is not recorded.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::types::RateLimitSettings;

/// Admission decision for one call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub allowed: bool,
    /// Calls left in the window after this one.
    pub remaining: u32,
    /// When the oldest in-window call ages out.
    pub reset_at: DateTime<Utc>,
}

/// Timestamps of prior calls for one identity.
#[derive(Debug, Default)]
struct SlidingWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while let Some(&ts) = self.timestamps.front() {
            if ts < cutoff {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-identity sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    windows: Mutex<HashMap<String, SlidingWindow>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check the limit for an identity, recording the call when allowed.
    pub fn check(&self, identity: &str) -> RateDecision {
        self.check_at(identity, Utc::now())
    }

    fn check_at(&self, identity: &str, now: DateTime<Utc>) -> RateDecision {
        let window_len = ChronoDuration::from_std(self.settings.window)
            .unwrap_or_else(|_| ChronoDuration::hours(1));
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows.entry(identity.to_string()).or_default();
        window.prune(now - window_len);

        let max = self.settings.max_requests as usize;
        if window.timestamps.len() >= max {
            let reset_at = window
                .timestamps
                .front()
                .map(|&oldest| oldest + window_len)
                .unwrap_or(now);
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        window.timestamps.push_back(now);
        let reset_at = window
            .timestamps
            .front()
            .map(|&oldest| oldest + window_len)
            .unwrap_or(now + window_len);
        RateDecision {
            allowed: true,
            remaining: (max - window.timestamps.len()) as u32,
            reset_at,
        }
    }

    /// Current in-window call count for an identity.
    #[cfg(test)]
    fn current_count(&self, identity: &str) -> usize {
        let window_len = ChronoDuration::from_std(self.settings.window)
            .unwrap_or_else(|_| ChronoDuration::hours(1));
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows
            .get_mut(identity)
            .map(|w| {
                w.prune(Utc::now() - window_len);
                w.timestamps.len()
            })
            .unwrap_or(0)
    }

    /// Drop the window for an identity.
    #[cfg(test)]
    fn clear_identity(&self, identity: &str) {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows.remove(identity);
    }
}
