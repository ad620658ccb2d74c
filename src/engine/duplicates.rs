//! Per-actor duplicate and near-duplicate message detection.

use std::collections::VecDeque;

use dashmap::DashMap;
use log::debug;

use crate::config::SpamSettings;
use crate::engine::similarity::similarity;
use crate::types::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    Clean,
    ExactDuplicate,
    NearDuplicate,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    text: String,
    timestamp_ms: i64,
}

/// Bounded rolling history of normalized messages per actor. The detector
/// only reports; the escalation engine decides what to do about a hit.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    histories: DashMap<ActorId, VecDeque<HistoryEntry>>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a normalized message against the actor's recent history, then
    /// append it regardless of outcome (oldest entry evicted at capacity).
    pub fn check(
        &self,
        actor: ActorId,
        normalized: &str,
        now_ms: i64,
        settings: &SpamSettings,
    ) -> DuplicateCheck {
        if !settings.enabled {
            return DuplicateCheck::Clean;
        }

        let mut history = self.histories.entry(actor).or_default();

        let cutoff = now_ms - settings.window_secs as i64 * 1000;
        while history.front().is_some_and(|e| e.timestamp_ms <= cutoff) {
            history.pop_front();
        }

        let result = Self::classify(&history, normalized, settings);

        history.push_back(HistoryEntry {
            text: normalized.to_string(),
            timestamp_ms: now_ms,
        });
        if history.len() > settings.history_capacity {
            history.pop_front();
        }

        result
    }

    fn classify(
        history: &VecDeque<HistoryEntry>,
        normalized: &str,
        settings: &SpamSettings,
    ) -> DuplicateCheck {
        let identical = history.iter().filter(|e| e.text == normalized).count();
        if identical >= settings.duplicate_threshold as usize {
            debug!("exact duplicate ({identical} identical in history)");
            return DuplicateCheck::ExactDuplicate;
        }

        let similar = history
            .iter()
            .filter(|e| similarity(&e.text, normalized) >= settings.similarity_threshold)
            .count();
        if similar >= settings.required_similar as usize {
            debug!("near duplicate ({similar} similar in history)");
            return DuplicateCheck::NearDuplicate;
        }

        DuplicateCheck::Clean
    }

    /// Drop entries outside the window; drop actors with nothing left.
    pub fn sweep(&self, now_ms: i64, settings: &SpamSettings) {
        let cutoff = now_ms - settings.window_secs as i64 * 1000;
        self.histories.retain(|_, history| {
            while history.front().is_some_and(|e| e.timestamp_ms <= cutoff) {
                history.pop_front();
            }
            !history.is_empty()
        });
    }

    pub fn clear_actor(&self, actor: ActorId) {
        self.histories.remove(&actor);
    }

    pub(crate) fn tracked_actors(&self) -> usize {
        self.histories.len()
    }

    #[cfg(test)]
    fn history_len(&self, actor: ActorId) -> usize {
        self.histories.get(&actor).map_or(0, |h| h.len())
    }
}
