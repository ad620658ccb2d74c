//! Per-actor mute state with human-readable duration parsing.

use std::sync::OnceLock;

use dashmap::DashMap;
use log::{info, warn};
use regex::Regex;
use thiserror::Error;

use crate::types::{ActorId, MuteRecord, PERMANENT_MUTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteSpan {
    Permanent,
    Seconds(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("empty duration spec")]
    Empty,
    #[error("unrecognized duration spec '{0}'")]
    Unrecognized(String),
}

fn duration_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^(?:\d+[smhd])+$").unwrap())
}

fn duration_tokens() -> &'static Regex {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    TOKENS.get_or_init(|| Regex::new(r"(\d+)([smhd])").unwrap())
}

/// Parse a duration spec: one or more `<int><unit>` tokens (s, m, h, d)
/// summed together, e.g. "1h30m" = 5400 seconds, or the literal
/// "permanent" in any case.
pub fn parse_duration(spec: &str) -> Result<MuteSpan, DurationParseError> {
    let spec = spec.trim().to_lowercase();
    if spec.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if spec == "permanent" {
        return Ok(MuteSpan::Permanent);
    }
    if !duration_shape().is_match(&spec) {
        return Err(DurationParseError::Unrecognized(spec));
    }

    let mut total_secs: u64 = 0;
    for capture in duration_tokens().captures_iter(&spec) {
        let amount: u64 = capture[1].parse().unwrap_or(0);
        let unit_secs = match &capture[2] {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            _ => 86_400,
        };
        total_secs = total_secs.saturating_add(amount.saturating_mul(unit_secs));
    }
    Ok(MuteSpan::Seconds(total_secs))
}

/// Live mutes keyed by actor. Both the escalation engine and the admin
/// surface write through this registry, so there is a single per-actor
/// mutation point and no lost updates between the two paths.
#[derive(Debug, Default)]
pub struct MuteRegistry {
    mutes: DashMap<ActorId, MuteRecord>,
}

impl MuteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mute from a human-entered duration spec. An unparseable spec falls
    /// back to `fallback_secs` (policy: a bad spec still mutes, it does not
    /// fail the command).
    pub fn mute(
        &self,
        actor: ActorId,
        spec: &str,
        reason: &str,
        now_ms: i64,
        fallback_secs: u64,
    ) -> MuteRecord {
        let span = match parse_duration(spec) {
            Ok(span) => span,
            Err(e) => {
                warn!("mute duration '{spec}' for {actor}: {e}; falling back to {fallback_secs}s");
                MuteSpan::Seconds(fallback_secs)
            }
        };
        self.apply(actor, span, reason, now_ms)
    }

    /// Mute for an exact number of seconds; the engine's escalation path.
    pub fn mute_for(&self, actor: ActorId, secs: u64, reason: &str, now_ms: i64) -> MuteRecord {
        self.apply(actor, MuteSpan::Seconds(secs), reason, now_ms)
    }

    fn apply(&self, actor: ActorId, span: MuteSpan, reason: &str, now_ms: i64) -> MuteRecord {
        let end_time_ms = match span {
            MuteSpan::Permanent => PERMANENT_MUTE,
            MuteSpan::Seconds(secs) => now_ms + secs as i64 * 1000,
        };
        let record = MuteRecord {
            actor,
            end_time_ms,
            reason: reason.to_string(),
            issued_at_ms: now_ms,
        };
        self.mutes.insert(actor, record.clone());
        match span {
            MuteSpan::Permanent => info!("{actor} muted permanently: {reason}"),
            MuteSpan::Seconds(secs) => info!("{actor} muted for {secs}s: {reason}"),
        }
        record
    }

    /// True iff a live record exists. An expired record is removed here as
    /// a side effect and treated as absent.
    pub fn is_muted(&self, actor: ActorId, now_ms: i64) -> bool {
        self.mutes.remove_if(&actor, |_, record| record.is_expired(now_ms));
        self.mutes.contains_key(&actor)
    }

    /// Current record, if live. Same lazy-expiry semantics as `is_muted`.
    pub fn get(&self, actor: ActorId, now_ms: i64) -> Option<MuteRecord> {
        self.mutes.remove_if(&actor, |_, record| record.is_expired(now_ms));
        self.mutes.get(&actor).map(|r| r.clone())
    }

    /// Remove any record unconditionally. Idempotent; unmuting an unknown
    /// actor is a no-op, not an error.
    pub fn unmute(&self, actor: ActorId) {
        if self.mutes.remove(&actor).is_some() {
            info!("{actor} unmuted");
        }
    }

    /// Drop every expired record.
    pub fn sweep(&self, now_ms: i64) {
        self.mutes.retain(|_, record| !record.is_expired(now_ms));
    }

    /// Number of records currently held, expired or not.
    pub(crate) fn active_mutes(&self) -> usize {
        self.mutes.len()
    }
}
