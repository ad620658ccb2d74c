// src/config/mod.rs - Moderation configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::Severity;

/// Warning surfaced while compiling a configuration. Never fatal: the
/// offending rule is skipped and the rest of the configuration stays live.
#[derive(Debug, Clone, Error)]
pub enum ConfigWarning {
    #[error("invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Complete engine configuration. Immutable once handed to the engine;
/// swapped atomically by `reload` without touching per-actor runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Master switch. When off, every message is allowed untouched.
    pub enabled: bool,
    pub rate_limit: RateLimitSettings,
    pub spam: SpamSettings,
    pub filters: FilterSettings,
    pub thresholds: EscalationThresholds,
    pub mutes: MuteSettings,
    /// Seconds between janitor sweeps.
    pub janitor_period_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit: RateLimitSettings::default(),
            spam: SpamSettings::default(),
            filters: FilterSettings::default(),
            thresholds: EscalationThresholds::default(),
            mutes: MuteSettings::default(),
            janitor_period_secs: 300,
        }
    }
}

/// Sustained and burst rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Sliding 60 second window allowance.
    pub messages_per_minute: u32,
    /// Consecutive sub-second messages tolerated before burst rejection.
    pub burst_limit: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_minute: 30,
            burst_limit: 5,
        }
    }
}

/// Duplicate and near-duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamSettings {
    pub enabled: bool,
    /// Identical history entries at which the next repeat is flagged.
    pub duplicate_threshold: u32,
    /// Normalized edit-distance similarity treated as "the same message".
    pub similarity_threshold: f64,
    /// Prior similar entries required before flagging a near-duplicate.
    pub required_similar: u32,
    /// Trailing window of history considered, in seconds.
    pub window_secs: u64,
    /// Recent messages kept per actor.
    pub history_capacity: usize,
}

impl Default for SpamSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duplicate_threshold: 2,
            similarity_threshold: 0.8,
            required_similar: 2,
            window_secs: 10,
            history_capacity: 10,
        }
    }
}

/// Content filtering rules and per-filter switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub profanity_enabled: bool,
    pub caps_enabled: bool,
    pub repeated_chars_enabled: bool,
    pub advertising_enabled: bool,
    pub toxicity_enabled: bool,

    /// Uppercase-letter percentage above which a message is shouting.
    pub caps_percentage: u32,
    /// Letters required before the caps check applies at all.
    pub caps_min_letters: usize,
    /// Identical-character run length above which a message is flagged.
    pub repeated_char_threshold: usize,
    /// Character used to mask blocked words.
    pub replacement_char: char,

    /// Words masked out of messages (case-insensitive substrings).
    pub blocked_words: Vec<String>,
    /// Words exempt from filtering even when blocklisted. Allowlist wins.
    pub allowed_words: Vec<String>,
    /// Per-word severity tags; a High-tagged match escalates the violation
    /// from Profanity to SevereProfanity.
    pub severity_overrides: HashMap<String, Severity>,
    /// Additional advertising patterns (regex) beyond the built-in set.
    pub extra_patterns: Vec<String>,
    /// Keyword list backing the default toxicity predicate.
    pub toxicity_keywords: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            profanity_enabled: true,
            caps_enabled: true,
            repeated_chars_enabled: true,
            advertising_enabled: true,
            toxicity_enabled: true,
            caps_percentage: 70,
            caps_min_letters: 5,
            repeated_char_threshold: 5,
            replacement_char: '*',
            blocked_words: Vec::new(),
            allowed_words: Vec::new(),
            severity_overrides: HashMap::new(),
            extra_patterns: Vec::new(),
            toxicity_keywords: default_toxicity_keywords(),
        }
    }
}

fn default_toxicity_keywords() -> Vec<String> {
    [
        "kys",
        "kill yourself",
        "hate",
        "stupid",
        "idiot",
        "noob",
        "trash",
        "garbage",
        "worthless",
        "useless",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Violation-count thresholds evaluated as an ordered table, most severe
/// first. Counts are taken over the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
    pub escalation_enabled: bool,
    pub warn_at: u32,
    pub mute_at: u32,
    pub kick_at: u32,
    pub ban_at: u32,
    /// Trailing span over which violations count toward escalation, seconds.
    pub retention_window_secs: u64,
    pub auto_mute: bool,
    pub auto_kick: bool,
    pub auto_ban: bool,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            escalation_enabled: true,
            warn_at: 3,
            mute_at: 5,
            kick_at: 8,
            ban_at: 10,
            retention_window_secs: 3600,
            auto_mute: true,
            auto_kick: true,
            auto_ban: true,
        }
    }
}

/// The action half of one threshold-table rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAction {
    Ban,
    Kick,
    Mute,
    Warn,
}

impl EscalationThresholds {
    /// The ordered table: highest rung first, disabled rungs omitted.
    /// First entry whose count is met decides the escalation.
    pub fn ladder(&self) -> Vec<(u32, ThresholdAction)> {
        let mut steps = Vec::with_capacity(4);
        if self.auto_ban {
            steps.push((self.ban_at, ThresholdAction::Ban));
        }
        if self.auto_kick {
            steps.push((self.kick_at, ThresholdAction::Kick));
        }
        if self.auto_mute {
            steps.push((self.mute_at, ThresholdAction::Mute));
        }
        steps.push((self.warn_at, ThresholdAction::Warn));
        steps
    }

    pub fn retention_window_ms(&self) -> i64 {
        self.retention_window_secs as i64 * 1000
    }
}

/// Mute durations applied by the engine's own escalation paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuteSettings {
    /// Seconds for a mute issued by the threshold ladder.
    pub escalation_mute_secs: u64,
    /// Seconds for the mute issued when the warning counter fills up.
    pub warning_mute_secs: u64,
    /// Fallback applied when an admin mute carries an unparseable duration.
    pub fallback_duration_secs: u64,
}

impl Default for MuteSettings {
    fn default() -> Self {
        Self {
            escalation_mute_secs: 600,
            warning_mute_secs: 300,
            fallback_duration_secs: 86_400,
        }
    }
}
