//! # Chatwarden
//!
//! A real-time abuse-detection and escalation engine for chat services,
//! designed to sit inside a game server or chat gateway and decide, per
//! message, whether to allow, filter, warn, mute, kick, ban or block.
//!
//! ## Features
//!
//! - **Rate Limiting**: per-actor sliding-window and burst admission checks
//! - **Duplicate Detection**: exact and near-duplicate spam via edit-distance
//!   similarity over a bounded rolling history
//! - **Content Filtering**: blocklist/allowlist word masking plus advertising
//!   pattern detection (IPs, bare domains, invite links)
//! - **Escalating Enforcement**: a data-driven threshold ladder turns
//!   accumulated violations into warnings, mutes, kicks and bans
//! - **Concurrent By Design**: all state is keyed per actor with per-entry
//!   locking; unrelated actors never contend
//! - **Fail-Open**: a failing detector is logged and skipped, never fatal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwarden::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (engine, warnings) = ModerationEngine::new(ModerationConfig::default());
//!     for warning in warnings {
//!         log::warn!("{warning}");
//!     }
//!
//!     let engine = Arc::new(engine);
//!     engine.clone().spawn_janitor();
//!
//!     let actor = ActorId::new();
//!     let now = SystemClock.now_millis();
//!     match engine.evaluate(actor, "hello everyone", "global", now).await {
//!         Decision::Allow => println!("deliver as-is"),
//!         Decision::Filter(masked) => println!("deliver filtered: {masked}"),
//!         other => println!("moderation action: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Evaluation is order-sensitive per actor: deliver one actor's messages to
//! [`ModerationEngine::evaluate`] in arrival order. Similarity scoring is
//! the only superlinear step, bounded at O(10 · L²) per message by the
//! history cap.

pub mod config;
pub mod engine;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::{ConfigWarning, EscalationThresholds, ModerationConfig};
    pub use crate::engine::clock::{Clock, SystemClock};
    pub use crate::engine::content_filter::{ContentFilter, MessageScanner, ScanReport};
    pub use crate::engine::{KeywordToxicity, ModerationEngine, ModerationHooks, ToxicityPredicate};
    pub use crate::types::{
        ActorId, ActorStats, Decision, Message, MuteRecord, Severity, Violation, ViolationType,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
