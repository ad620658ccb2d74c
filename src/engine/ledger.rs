//! Per-actor violation records with time-windowed counting.

use dashmap::DashMap;
use log::debug;

use crate::types::{ActorId, Violation};

/// Append-only per-actor violation store, pruned to the retention window
/// lazily on every write and eagerly by the janitor.
#[derive(Debug, Default)]
pub struct ViolationLedger {
    entries: DashMap<ActorId, Vec<Violation>>,
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation, pruning this actor's aged-out entries first.
    pub fn record(&self, violation: Violation, retention_ms: i64) {
        let mut entries = self.entries.entry(violation.actor).or_default();
        let cutoff = violation.timestamp_ms - retention_ms;
        entries.retain(|v| v.timestamp_ms > cutoff);
        debug!(
            "recorded {:?} violation for {} in #{}",
            violation.kind, violation.actor, violation.channel
        );
        entries.push(violation);
    }

    /// Violations strictly newer than `now - window`. Shrinking the window
    /// can only shrink the count; entries on the boundary are excluded.
    pub fn count_since(&self, actor: ActorId, now_ms: i64, window_ms: i64) -> u32 {
        let cutoff = now_ms - window_ms;
        self.entries.get(&actor).map_or(0, |entries| {
            entries.iter().filter(|v| v.timestamp_ms > cutoff).count() as u32
        })
    }

    /// Severity-weighted count over the same window (Low=1, Medium=2, High=3).
    pub fn weighted_score(&self, actor: ActorId, now_ms: i64, window_ms: i64) -> u32 {
        let cutoff = now_ms - window_ms;
        self.entries.get(&actor).map_or(0, |entries| {
            entries
                .iter()
                .filter(|v| v.timestamp_ms > cutoff)
                .map(|v| v.severity.weight())
                .sum()
        })
    }

    /// Prune aged-out entries for every actor; drop actors left empty.
    pub fn sweep(&self, now_ms: i64, retention_ms: i64) {
        let cutoff = now_ms - retention_ms;
        self.entries.retain(|_, entries| {
            entries.retain(|v| v.timestamp_ms > cutoff);
            !entries.is_empty()
        });
    }

    pub fn clear_actor(&self, actor: ActorId) {
        self.entries.remove(&actor);
    }

    pub(crate) fn tracked_actors(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViolationType;

    const T0: i64 = 1_700_000_000_000;
    const HOUR_MS: i64 = 3_600_000;

    fn spam(actor: ActorId, at: i64) -> Violation {
        Violation::new(actor, ViolationType::Spam, "global", "spam spam", at)
    }

    #[test]
    fn counts_only_entries_inside_window() {
        let ledger = ViolationLedger::new();
        let actor = ActorId::new();

        ledger.record(spam(actor, T0), HOUR_MS);
        ledger.record(spam(actor, T0 + 10_000), HOUR_MS);
        assert_eq!(ledger.count_since(actor, T0 + 10_000, HOUR_MS), 2);
        assert_eq!(ledger.count_since(actor, T0 + 10_000, 5_000), 1);
    }

    #[test]
    fn boundary_entry_is_excluded() {
        let ledger = ViolationLedger::new();
        let actor = ActorId::new();

        ledger.record(spam(actor, T0), HOUR_MS);
        // Entry timestamp is exactly now - window: outside.
        assert_eq!(ledger.count_since(actor, T0 + HOUR_MS, HOUR_MS), 0);
        assert_eq!(ledger.count_since(actor, T0 + HOUR_MS - 1, HOUR_MS), 1);
    }

    #[test]
    fn aged_out_violations_stop_counting() {
        let ledger = ViolationLedger::new();
        let actor = ActorId::new();

        for i in 0..4 {
            ledger.record(spam(actor, T0 + i), HOUR_MS);
        }
        assert_eq!(ledger.count_since(actor, T0 + 2 * HOUR_MS, HOUR_MS), 0);
    }

    #[test]
    fn recording_prunes_old_entries() {
        let ledger = ViolationLedger::new();
        let actor = ActorId::new();

        ledger.record(spam(actor, T0), HOUR_MS);
        ledger.record(spam(actor, T0 + 2 * HOUR_MS), HOUR_MS);
        // The old entry was pruned on the second record, not just hidden.
        let stored = ledger.entries.get(&actor).unwrap().len();
        assert_eq!(stored, 1);
    }

    #[test]
    fn weighted_score_uses_severity_weights() {
        let ledger = ViolationLedger::new();
        let actor = ActorId::new();

        ledger.record(
            Violation::new(actor, ViolationType::ExcessiveCaps, "global", "LOUD", T0),
            HOUR_MS,
        );
        ledger.record(
            Violation::new(actor, ViolationType::Profanity, "global", "rude", T0 + 1),
            HOUR_MS,
        );
        ledger.record(
            Violation::new(actor, ViolationType::Advertising, "global", "ad.com", T0 + 2),
            HOUR_MS,
        );
        // 1 + 2 + 3
        assert_eq!(ledger.weighted_score(actor, T0 + 10, HOUR_MS), 6);
    }

    #[test]
    fn sweep_drops_empty_actors() {
        let ledger = ViolationLedger::new();
        let actor = ActorId::new();

        ledger.record(spam(actor, T0), HOUR_MS);
        ledger.sweep(T0 + 2 * HOUR_MS, HOUR_MS);
        assert!(ledger.entries.get(&actor).is_none());
    }

    #[test]
    fn unknown_actor_counts_zero() {
        let ledger = ViolationLedger::new();
        assert_eq!(ledger.count_since(ActorId::new(), T0, HOUR_MS), 0);
        assert_eq!(ledger.weighted_score(ActorId::new(), T0, HOUR_MS), 0);
    }
}
