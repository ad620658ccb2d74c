// src/types/mod.rs - Shared data model for the moderation engine

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable opaque identifier for a message sender. Keys all per-actor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An inbound chat message as seen by the engine. Created at evaluation
/// time, never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub actor: ActorId,
    pub raw: String,
    /// Lowercased and trimmed form used for duplicate and toxicity checks.
    pub normalized: String,
    pub channel: String,
    pub timestamp_ms: i64,
}

impl Message {
    pub fn new(actor: ActorId, raw: &str, channel: &str, timestamp_ms: i64) -> Self {
        Self {
            actor,
            raw: raw.to_string(),
            normalized: raw.trim().to_lowercase(),
            channel: channel.to_string(),
            timestamp_ms,
        }
    }
}

/// Categories of chat abuse the engine detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationType {
    Profanity,
    SevereProfanity,
    Spam,
    ExcessiveCaps,
    RepeatedCharacters,
    Advertising,
    Toxicity,
}

impl ViolationType {
    /// Fixed severity per violation category.
    pub fn severity(&self) -> Severity {
        match self {
            ViolationType::Advertising => Severity::High,
            ViolationType::SevereProfanity => Severity::High,
            ViolationType::Toxicity => Severity::Medium,
            ViolationType::Profanity => Severity::Medium,
            ViolationType::Spam => Severity::Medium,
            ViolationType::ExcessiveCaps => Severity::Low,
            ViolationType::RepeatedCharacters => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Weight used by the ledger's severity-weighted score.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
        }
    }
}

/// A single recorded infraction. Immutable once created; lives inside the
/// violation ledger until it ages out of the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub actor: ActorId,
    pub kind: ViolationType,
    pub severity: Severity,
    pub channel: String,
    /// Snapshot of the offending message, kept for review.
    pub message: String,
    pub timestamp_ms: i64,
}

impl Violation {
    pub fn new(
        actor: ActorId,
        kind: ViolationType,
        channel: &str,
        message: &str,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            actor,
            kind,
            severity: kind.severity(),
            channel: channel.to_string(),
            message: message.to_string(),
            timestamp_ms,
        }
    }
}

/// The one decision produced per evaluated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Deliver unchanged.
    Allow,
    /// Deliver the contained masked/cleaned text instead of the original.
    Filter(String),
    /// Deliver nothing; warn the sender. Carries the recent violation count.
    Warn(u32),
    /// Sender muted for the contained number of seconds.
    Mute(u64),
    /// Kick requested from the external authority.
    Kick,
    /// Ban requested from the external authority.
    Ban,
    /// Message dropped outright, no salvage.
    Block,
}

/// Sentinel end time for a mute with no expiry.
pub const PERMANENT_MUTE: i64 = -1;

/// Live mute state for one actor. A new mute overwrites the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteRecord {
    pub actor: ActorId,
    /// Epoch millis at which the mute ends, or [`PERMANENT_MUTE`].
    pub end_time_ms: i64,
    pub reason: String,
    pub issued_at_ms: i64,
}

impl MuteRecord {
    pub fn is_permanent(&self) -> bool {
        self.end_time_ms == PERMANENT_MUTE
    }

    /// An expired record must be treated as absent everywhere.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        !self.is_permanent() && self.end_time_ms <= now_ms
    }
}

/// Read-only per-actor diagnostics for the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorStats {
    /// Violations within the retention window.
    pub violation_count: u32,
    pub warnings: u32,
    pub muted: bool,
    pub mute_ends_at: Option<i64>,
}
