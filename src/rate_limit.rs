//! Per-wallet fixed-window rate limiting.
//!
//! The limiter is the gateway's only shared mutable state. Entries live in a
//! concurrent map keyed by lowercased wallet address; the per-key entry lock
//! makes the window-check-then-increment atomic, so two simultaneous
//! requests from one wallet cannot both observe "count still under limit".
//!
//! This is a fixed-window limiter: a wallet can burst up to twice the
//! nominal rate across a window boundary. That is accepted, documented
//! behavior (tests pin it down), not a defect to be fixed with a sliding
//! window, which would change observable throttling.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Requests allowed per window by default.
pub const DEFAULT_MAX_PER_WINDOW: u32 = 10;
/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Map size that triggers a sweep of elapsed windows.
const SWEEP_THRESHOLD: usize = 1024;
/// Bucket for requests with no identifiable wallet.
const UNKNOWN_WALLET: &str = "unknown";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Seconds until the current window resets, rounded up. A fresh window
    /// reports the full window length.
    pub reset_in_seconds: u64,
}

/// The admission capability the orchestrator depends on.
///
/// Process-local deployments use [`FixedWindowLimiter`]; multi-instance
/// deployments can plug a distributed counter behind the same trait.
pub trait RateLimiter: Send + Sync {
    fn admit(&self, wallet: Option<&str>) -> RateLimitDecision;
}

impl<T: RateLimiter + ?Sized> RateLimiter for std::sync::Arc<T> {
    fn admit(&self, wallet: Option<&str>) -> RateLimitDecision {
        self.as_ref().admit(wallet)
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_started: Instant,
}

/// In-memory fixed-window limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max_per_window: u32,
    entries: DashMap<String, WindowEntry>,
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_PER_WINDOW)
    }
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_per_window: u32) -> Self {
        Self {
            window,
            max_per_window,
            entries: DashMap::new(),
        }
    }

    /// Drops entries whose window has already elapsed.
    ///
    /// Triggered by map size, not a timer: the sweep runs before taking an
    /// entry lock, so it never deadlocks against `admit`.
    fn sweep(&self, now: Instant) {
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_started) < self.window);
    }

    fn admit_at(&self, wallet: Option<&str>, now: Instant) -> RateLimitDecision {
        if self.entries.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }

        let key = wallet
            .map(|w| w.to_lowercase())
            .unwrap_or_else(|| UNKNOWN_WALLET.to_string());

        let mut entry = self.entries.entry(key).or_insert(WindowEntry {
            count: 0,
            window_started: now,
        });

        let elapsed = now.duration_since(entry.window_started);
        if elapsed >= self.window {
            entry.count = 0;
            entry.window_started = now;
        }

        if entry.count < self.max_per_window {
            entry.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.max_per_window - entry.count,
                reset_in_seconds: remaining_seconds(
                    self.window,
                    now.duration_since(entry.window_started),
                ),
            }
        } else {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in_seconds: remaining_seconds(self.window, elapsed),
            }
        }
    }
}

/// Seconds until the window elapses, rounded up so clients never retry early.
fn remaining_seconds(window: Duration, elapsed: Duration) -> u64 {
    let left = window.saturating_sub(elapsed);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

impl RateLimiter for FixedWindowLimiter {
    fn admit(&self, wallet: Option<&str>) -> RateLimitDecision {
        self.admit_at(wallet, Instant::now())
    }
}
