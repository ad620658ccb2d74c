// src/engine/mod.rs - Escalation engine tying the detection subsystems together

pub mod clock;
pub mod content_filter;
pub mod duplicates;
pub mod janitor;
pub mod ledger;
pub mod mutes;
pub mod rate_limiter;
pub mod similarity;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, info, warn};

use crate::config::{ConfigWarning, FilterSettings, ModerationConfig, ThresholdAction};
use crate::types::{ActorId, ActorStats, Decision, Message, MuteRecord, Severity, Violation, ViolationType};

use self::clock::{Clock, SystemClock};
use self::content_filter::{ContentFilter, MessageScanner};
use self::duplicates::{DuplicateCheck, DuplicateDetector};
use self::ledger::ViolationLedger;
use self::mutes::MuteRegistry;
use self::rate_limiter::{RateCheck, RateLimiter};

/// Fire-and-forget collaborator hooks. Implementations must not block;
/// every call is dispatched on a spawned task and its outcome never
/// affects the decision already made.
#[async_trait]
pub trait ModerationHooks: Send + Sync {
    /// Deliver a user-facing notice ("muted for 5 minutes", ...).
    async fn notify_actor(&self, _actor: ActorId, _decision: Decision) {}
    /// Durable-storage hook for a recorded violation.
    async fn persist_violation(&self, _violation: Violation) {}
    /// Durable-storage hook for a written mute.
    async fn persist_mute(&self, _record: MuteRecord) {}
    /// Ask the external authority to kick. The engine requests, it does
    /// not execute.
    async fn request_kick(&self, _actor: ActorId, _reason: String) {}
    /// Ask the external authority to ban.
    async fn request_ban(&self, _actor: ActorId, _reason: String) {}
}

/// Pluggable toxicity check. The stock implementation is a static keyword
/// containment test; embedders can inject a real classifier.
pub trait ToxicityPredicate: Send + Sync {
    fn is_toxic(&self, normalized: &str) -> Result<bool>;
}

/// Keyword-containment toxicity check over normalized text.
pub struct KeywordToxicity {
    keywords: Vec<String>,
}

impl KeywordToxicity {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl ToxicityPredicate for KeywordToxicity {
    fn is_toxic(&self, normalized: &str) -> Result<bool> {
        Ok(self.keywords.iter().any(|k| normalized.contains(k.as_str())))
    }
}

struct ScannerSlot {
    scanner: Arc<dyn MessageScanner>,
    /// Built from config (and rebuilt on reload), as opposed to injected.
    builtin: bool,
}

enum ToxicitySlot {
    Keywords(KeywordToxicity),
    Custom(Arc<dyn ToxicityPredicate>),
}

impl ToxicitySlot {
    fn probe(&self, normalized: &str) -> Result<bool> {
        match self {
            ToxicitySlot::Keywords(keywords) => keywords.is_toxic(normalized),
            ToxicitySlot::Custom(custom) => custom.is_toxic(normalized),
        }
    }
}

/// The moderation engine. One evaluation per inbound message; all state is
/// kept in per-actor concurrent stores so unrelated actors never contend.
pub struct ModerationEngine {
    config: RwLock<Arc<ModerationConfig>>,
    scanner: RwLock<ScannerSlot>,
    toxicity: RwLock<ToxicitySlot>,
    rate_limiter: RateLimiter,
    duplicates: DuplicateDetector,
    ledger: ViolationLedger,
    mutes: MuteRegistry,
    warning_counts: DashMap<ActorId, u32>,
    hooks: Option<Arc<dyn ModerationHooks>>,
    clock: Arc<dyn Clock>,
}

impl ModerationEngine {
    /// Build an engine from configuration. Invalid filter patterns are
    /// skipped and returned as warnings; they never prevent startup.
    pub fn new(config: ModerationConfig) -> (Self, Vec<ConfigWarning>) {
        let (filter, warnings) = ContentFilter::from_settings(&config.filters);
        let toxicity = KeywordToxicity::new(config.filters.toxicity_keywords.clone());
        let engine = Self {
            config: RwLock::new(Arc::new(config)),
            scanner: RwLock::new(ScannerSlot {
                scanner: Arc::new(filter),
                builtin: true,
            }),
            toxicity: RwLock::new(ToxicitySlot::Keywords(toxicity)),
            rate_limiter: RateLimiter::new(),
            duplicates: DuplicateDetector::new(),
            ledger: ViolationLedger::new(),
            mutes: MuteRegistry::new(),
            warning_counts: DashMap::new(),
            hooks: None,
            clock: Arc::new(SystemClock),
        };
        (engine, warnings)
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ModerationHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the content scanner. An injected scanner is left untouched
    /// by `reload`.
    pub fn with_scanner(mut self, scanner: Arc<dyn MessageScanner>) -> Self {
        self.scanner = RwLock::new(ScannerSlot {
            scanner,
            builtin: false,
        });
        self
    }

    pub fn with_toxicity(mut self, predicate: Arc<dyn ToxicityPredicate>) -> Self {
        self.toxicity = RwLock::new(ToxicitySlot::Custom(predicate));
        self
    }

    /// Atomically swap configuration. Per-actor runtime state (windows,
    /// histories, ledgers, mutes, warning counters) is untouched.
    pub fn reload(&self, config: ModerationConfig) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        {
            let mut slot = self.scanner.write().unwrap();
            if slot.builtin {
                let (filter, compile_warnings) = ContentFilter::from_settings(&config.filters);
                warnings = compile_warnings;
                slot.scanner = Arc::new(filter);
            }
        }
        {
            let mut slot = self.toxicity.write().unwrap();
            if matches!(&*slot, ToxicitySlot::Keywords(_)) {
                *slot =
                    ToxicitySlot::Keywords(KeywordToxicity::new(config.filters.toxicity_keywords.clone()));
            }
        }
        *self.config.write().unwrap() = Arc::new(config);
        info!("moderation configuration reloaded");
        warnings
    }

    fn config_snapshot(&self) -> Arc<ModerationConfig> {
        self.config.read().unwrap().clone()
    }

    /// Evaluate one inbound message and produce exactly one decision.
    ///
    /// A failing detector is logged and treated as "nothing detected";
    /// the worst outcome of an internal fault is an unfiltered message
    /// (fail-open for availability, by policy).
    pub async fn evaluate(&self, actor: ActorId, text: &str, channel: &str, now_ms: i64) -> Decision {
        let cfg = self.config_snapshot();
        if !cfg.enabled {
            return Decision::Allow;
        }

        let message = Message::new(actor, text, channel, now_ms);

        // Rate limiting short-circuits content analysis entirely: a
        // rejected message is never delivered, whatever else it contains.
        let rate = self.rate_limiter.check(actor, now_ms, &cfg.rate_limit);
        if rate != RateCheck::Allowed {
            debug!("{actor} rate limited ({rate:?}) in #{channel}");
            self.record_violation(
                Violation::new(actor, ViolationType::Spam, channel, text, now_ms),
                &cfg,
            );
            let decision = self.escalate(&message, &cfg, Decision::Block);
            self.fire_notify(actor, decision.clone());
            return decision;
        }

        let mut violations: Vec<ViolationType> = Vec::new();
        let mut filtered = text.to_string();

        if self.duplicates.check(actor, &message.normalized, now_ms, &cfg.spam)
            != DuplicateCheck::Clean
        {
            violations.push(ViolationType::Spam);
        }

        if cfg.filters.caps_enabled && excessive_caps(text, &cfg.filters) {
            violations.push(ViolationType::ExcessiveCaps);
            filtered = filtered.to_lowercase();
        }

        if cfg.filters.repeated_chars_enabled
            && has_repeated_run(text, cfg.filters.repeated_char_threshold)
        {
            violations.push(ViolationType::RepeatedCharacters);
            filtered = squash_repeats(&filtered, cfg.filters.repeated_char_threshold);
        }

        let scanner = self.scanner.read().unwrap().scanner.clone();
        match scanner.scan(&filtered) {
            Ok(report) => {
                if !report.matched_words.is_empty() {
                    let severe = report.matched_words.iter().any(|word| {
                        cfg.filters.severity_overrides.get(word) == Some(&Severity::High)
                    });
                    violations.push(if severe {
                        ViolationType::SevereProfanity
                    } else {
                        ViolationType::Profanity
                    });
                }
                if !report.matched_patterns.is_empty() {
                    violations.push(ViolationType::Advertising);
                }
                filtered = report.filtered_text;
            }
            Err(e) => {
                error!("content scan failed for {actor}: {e:#}; continuing without its signal");
            }
        }

        if cfg.filters.toxicity_enabled {
            let probed = self.toxicity.read().unwrap().probe(&message.normalized);
            match probed {
                Ok(true) => violations.push(ViolationType::Toxicity),
                Ok(false) => {}
                Err(e) => {
                    error!("toxicity probe failed for {actor}: {e:#}; continuing without its signal");
                }
            }
        }

        if violations.is_empty() {
            return Decision::Allow;
        }

        for kind in &violations {
            self.record_violation(Violation::new(actor, *kind, channel, text, now_ms), &cfg);
        }

        // Advertising and severe profanity are never salvageable by
        // masking: the message blocks outright, thresholds bypassed.
        if violations.contains(&ViolationType::Advertising)
            || violations.contains(&ViolationType::SevereProfanity)
        {
            info!("{actor} blocked in #{channel}: {violations:?}");
            self.fire_notify(actor, Decision::Block);
            return Decision::Block;
        }

        let decision = self.escalate(&message, &cfg, Decision::Filter(filtered));
        match decision {
            Decision::Allow | Decision::Filter(_) => {}
            ref other => self.fire_notify(actor, other.clone()),
        }
        decision
    }

    /// Walk the ordered threshold table, most severe rung first. Falls back
    /// to the given decision when no rung is met or escalation is off.
    fn escalate(&self, message: &Message, cfg: &ModerationConfig, fallback: Decision) -> Decision {
        if !cfg.thresholds.escalation_enabled {
            return fallback;
        }

        let window_ms = cfg.thresholds.retention_window_ms();
        let count = self
            .ledger
            .count_since(message.actor, message.timestamp_ms, window_ms);
        for (at, action) in cfg.thresholds.ladder() {
            if count >= at {
                debug!(
                    "escalating {}: count={count} weighted={} -> {action:?}",
                    message.actor,
                    self.ledger
                        .weighted_score(message.actor, message.timestamp_ms, window_ms)
                );
                return self.apply_threshold(action, message, cfg, count);
            }
        }
        fallback
    }

    fn apply_threshold(
        &self,
        action: ThresholdAction,
        message: &Message,
        cfg: &ModerationConfig,
        count: u32,
    ) -> Decision {
        let actor = message.actor;
        let now_ms = message.timestamp_ms;
        match action {
            ThresholdAction::Ban => {
                warn!("{actor} reached ban threshold ({count} violations)");
                self.fire_request_ban(actor, "repeated chat violations".to_string());
                Decision::Ban
            }
            ThresholdAction::Kick => {
                warn!("{actor} reached kick threshold ({count} violations)");
                self.fire_request_kick(actor, "repeated chat violations".to_string());
                Decision::Kick
            }
            ThresholdAction::Mute => {
                let secs = cfg.mutes.escalation_mute_secs;
                let record = self
                    .mutes
                    .mute_for(actor, secs, "accumulated chat violations", now_ms);
                self.fire_persist_mute(record);
                Decision::Mute(secs)
            }
            ThresholdAction::Warn => self.apply_warning(actor, cfg, count, now_ms),
        }
    }

    /// The warning counter is its own escalation path: enough warnings mute
    /// on their own, even when the ledger count has not reached the mute
    /// rung. Tracked independently of the ledger, as designed.
    fn apply_warning(&self, actor: ActorId, cfg: &ModerationConfig, count: u32, now_ms: i64) -> Decision {
        let warnings = {
            let mut entry = self.warning_counts.entry(actor).or_insert(0);
            *entry += 1;
            *entry
        };
        info!("{actor} warned ({warnings} warnings, {count} recent violations)");

        if warnings >= cfg.thresholds.warn_at && cfg.thresholds.auto_mute {
            let record = self.mutes.mute_for(
                actor,
                cfg.mutes.warning_mute_secs,
                "repeated warnings",
                now_ms,
            );
            self.fire_persist_mute(record);
        }
        Decision::Warn(count)
    }

    fn record_violation(&self, violation: Violation, cfg: &ModerationConfig) {
        self.ledger
            .record(violation.clone(), cfg.thresholds.retention_window_ms());
        self.fire_persist_violation(violation);
    }

    // Administrative surface. Writes go through the same per-actor stores
    // as the engine's own, so manual and automatic paths cannot race past
    // each other.

    pub fn is_muted(&self, actor: ActorId, now_ms: i64) -> bool {
        self.mutes.is_muted(actor, now_ms)
    }

    /// Manual mute with a human-entered duration spec ("1h30m",
    /// "permanent"). An unparseable spec falls back to the configured
    /// default duration.
    pub fn mute(&self, actor: ActorId, spec: &str, reason: &str, now_ms: i64) -> MuteRecord {
        let cfg = self.config_snapshot();
        let record = self
            .mutes
            .mute(actor, spec, reason, now_ms, cfg.mutes.fallback_duration_secs);
        self.fire_persist_mute(record.clone());
        record
    }

    pub fn unmute(&self, actor: ActorId) {
        self.mutes.unmute(actor);
    }

    /// Read-only diagnostics for one actor.
    pub fn actor_stats(&self, actor: ActorId) -> ActorStats {
        let cfg = self.config_snapshot();
        let now_ms = self.clock.now_millis();
        let record = self.mutes.get(actor, now_ms);
        ActorStats {
            violation_count: self
                .ledger
                .count_since(actor, now_ms, cfg.thresholds.retention_window_ms()),
            warnings: self.warning_counts.get(&actor).map_or(0, |w| *w),
            muted: record.is_some(),
            mute_ends_at: record.map(|r| r.end_time_ms),
        }
    }

    /// Severity-weighted violation score over the retention window.
    pub fn severity_score(&self, actor: ActorId, now_ms: i64) -> u32 {
        let cfg = self.config_snapshot();
        self.ledger
            .weighted_score(actor, now_ms, cfg.thresholds.retention_window_ms())
    }

    /// Aggregate store sizes for dashboards and health checks.
    pub fn engine_stats(&self) -> HashMap<String, serde_json::Value> {
        let mut stats = HashMap::new();
        stats.insert(
            "rate_limited_actors".to_string(),
            serde_json::Value::Number(self.rate_limiter.tracked_actors().into()),
        );
        stats.insert(
            "actors_with_history".to_string(),
            serde_json::Value::Number(self.duplicates.tracked_actors().into()),
        );
        stats.insert(
            "actors_with_violations".to_string(),
            serde_json::Value::Number(self.ledger.tracked_actors().into()),
        );
        stats.insert(
            "active_mutes".to_string(),
            serde_json::Value::Number(self.mutes.active_mutes().into()),
        );
        stats.insert(
            "warned_actors".to_string(),
            serde_json::Value::Number(self.warning_counts.len().into()),
        );
        stats
    }

    /// Release an actor's transient state on disconnect. Mute records and
    /// the warning counter survive reconnects deliberately.
    pub fn clear_actor(&self, actor: ActorId) {
        self.rate_limiter.clear_actor(actor);
        self.duplicates.clear_actor(actor);
        self.ledger.clear_actor(actor);
        debug!("cleared transient state for {actor}");
    }

    fn fire_notify(&self, actor: ActorId, decision: Decision) {
        if let Some(hooks) = &self.hooks {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.notify_actor(actor, decision).await });
        }
    }

    fn fire_persist_violation(&self, violation: Violation) {
        if let Some(hooks) = &self.hooks {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.persist_violation(violation).await });
        }
    }

    fn fire_persist_mute(&self, record: MuteRecord) {
        if let Some(hooks) = &self.hooks {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.persist_mute(record).await });
        }
    }

    fn fire_request_kick(&self, actor: ActorId, reason: String) {
        if let Some(hooks) = &self.hooks {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.request_kick(actor, reason).await });
        }
    }

    fn fire_request_ban(&self, actor: ActorId, reason: String) {
        if let Some(hooks) = &self.hooks {
            let hooks = hooks.clone();
            tokio::spawn(async move { hooks.request_ban(actor, reason).await });
        }
    }
}

/// Uppercase ratio check. Only applies once a message has enough letters
/// to judge; short interjections are left alone.
fn excessive_caps(text: &str, filters: &FilterSettings) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < filters.caps_min_letters {
        return false;
    }
    let caps = letters.iter().filter(|c| c.is_uppercase()).count();
    caps * 100 > filters.caps_percentage as usize * letters.len()
}

/// True when any character repeats consecutively beyond the threshold.
fn has_repeated_run(text: &str, threshold: usize) -> bool {
    let mut run = 0usize;
    let mut last: Option<char> = None;
    for c in text.chars() {
        if Some(c) == last {
            run += 1;
            if run > threshold {
                return true;
            }
        } else {
            run = 1;
            last = Some(c);
        }
    }
    false
}

/// Cap consecutive repeats of any character at the threshold.
fn squash_repeats(text: &str, threshold: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    let mut last: Option<char> = None;
    for c in text.chars() {
        if Some(c) == last {
            run += 1;
        } else {
            run = 1;
            last = Some(c);
        }
        if run <= threshold {
            out.push(c);
        }
    }
    out
}
