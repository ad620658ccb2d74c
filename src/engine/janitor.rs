//! Periodic garbage collection of per-actor state.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::ModerationEngine;

impl ModerationEngine {
    /// Prune expired entries across every store: aged-out violations,
    /// stale duplicate history, expired mutes, idle rate state. Safe to
    /// run concurrently with live evaluations; each actor's entry is
    /// locked individually and only for as long as it takes to prune it.
    pub fn sweep(&self, now_ms: i64) {
        let cfg = self.config_snapshot();
        self.ledger.sweep(now_ms, cfg.thresholds.retention_window_ms());
        self.duplicates.sweep(now_ms, &cfg.spam);
        self.mutes.sweep(now_ms);
        self.rate_limiter.sweep(now_ms);
        debug!("janitor sweep completed");
    }

    /// Run [`sweep`](Self::sweep) on the configured period until the task
    /// is aborted. The period is read once at spawn time.
    pub fn spawn_janitor(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config_snapshot().janitor_period_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now_ms = self.clock.now_millis();
                self.sweep(now_ms);
            }
        })
    }
}
