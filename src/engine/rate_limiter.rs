//! Per-actor sliding-window and burst admission checks.

use dashmap::DashMap;
use log::debug;

use crate::config::RateLimitSettings;
use crate::types::ActorId;

/// Sliding window span for the sustained limit.
const WINDOW_MS: i64 = 60_000;
/// Gap below which consecutive messages count as a burst.
const BURST_GAP_MS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCheck {
    Allowed,
    RateExceeded,
    BurstExceeded,
}

#[derive(Debug, Default)]
struct RateState {
    /// Send timestamps within the trailing window, oldest first.
    window: Vec<i64>,
    last_message_ms: Option<i64>,
    burst_count: u32,
}

/// Admission control for message frequency. State is keyed by actor with
/// per-entry locking; unrelated actors never contend.
#[derive(Debug, Default)]
pub struct RateLimiter {
    states: DashMap<ActorId, RateState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check one send attempt. Burst bookkeeping updates even on rejection
    /// so that rapid retries keep tripping the limit instead of resetting it.
    pub fn check(&self, actor: ActorId, now_ms: i64, settings: &RateLimitSettings) -> RateCheck {
        if !settings.enabled {
            return RateCheck::Allowed;
        }

        let mut state = self.states.entry(actor).or_default();

        match state.last_message_ms {
            Some(last) if now_ms - last < BURST_GAP_MS => state.burst_count += 1,
            _ => state.burst_count = 0,
        }
        state.last_message_ms = Some(now_ms);

        if state.burst_count >= settings.burst_limit {
            debug!("burst limit tripped for {actor} ({} rapid messages)", state.burst_count + 1);
            return RateCheck::BurstExceeded;
        }

        let cutoff = now_ms - WINDOW_MS;
        state.window.retain(|&t| t > cutoff);

        if state.window.len() >= settings.messages_per_minute as usize {
            debug!("rate limit tripped for {actor} ({} in window)", state.window.len());
            return RateCheck::RateExceeded;
        }

        state.window.push(now_ms);
        RateCheck::Allowed
    }

    /// Drop state for actors with no traffic inside the window.
    pub fn sweep(&self, now_ms: i64) {
        let cutoff = now_ms - WINDOW_MS;
        self.states
            .retain(|_, state| state.last_message_ms.is_some_and(|last| last > cutoff));
    }

    pub fn clear_actor(&self, actor: ActorId) {
        self.states.remove(&actor);
    }

    pub(crate) fn tracked_actors(&self) -> usize {
        self.states.len()
    }
}
