//! Blocklist/allowlist word filtering with masking, plus advertising
//! pattern detection.

use std::collections::BTreeSet;

use anyhow::Result;
use log::warn;
use regex::Regex;

use crate::config::{ConfigWarning, FilterSettings};

/// Identifies which pattern class matched, so callers can tell advertising
/// apart from word-level profanity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternId {
    IpAddress,
    Domain,
    Invite,
    /// Index into the configured extra patterns.
    Custom(usize),
}

/// Result of scanning one message.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub matched_words: BTreeSet<String>,
    pub matched_patterns: Vec<PatternId>,
    /// Input with every matched blocked word masked out. Pattern matches are
    /// never masked; they block the whole message instead.
    pub filtered_text: String,
}

/// Seam for content scanning. The escalation engine only depends on this
/// trait, so embedders can swap the implementation and a scan failure
/// degrades to "nothing detected" rather than an undecided message.
pub trait MessageScanner: Send + Sync {
    fn scan(&self, text: &str) -> Result<ScanReport>;
}

/// Static word and pattern rules compiled from [`FilterSettings`].
/// Stateless once built; rebuilt wholesale on config reload.
pub struct ContentFilter {
    /// Effective blocklist: lowercased, minus the allowlist.
    blocked: Vec<String>,
    patterns: Vec<(PatternId, Regex)>,
    mask_char: char,
}

impl ContentFilter {
    /// Compile the rule set. Patterns that fail to compile are skipped and
    /// surfaced as warnings; filtering continues with the rest.
    pub fn from_settings(settings: &FilterSettings) -> (Self, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let allowed: BTreeSet<String> =
            settings.allowed_words.iter().map(|w| w.to_lowercase()).collect();
        let blocked = if settings.profanity_enabled {
            settings
                .blocked_words
                .iter()
                .map(|w| w.to_lowercase())
                .filter(|w| !allowed.contains(w))
                .collect()
        } else {
            Vec::new()
        };

        let mut patterns = Vec::new();
        if settings.advertising_enabled {
            let builtin = [
                (PatternId::IpAddress, r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b"),
                (PatternId::Domain, r"\b[a-zA-Z0-9-]+\.[a-zA-Z]{2,}\b"),
                (PatternId::Invite, r"(?i)discord\.gg/[a-zA-Z0-9]+"),
                (PatternId::Invite, r"(?i)discordapp\.com/invite/[a-zA-Z0-9]+"),
            ];
            for (id, pattern) in builtin {
                Self::compile(id, pattern, &mut patterns, &mut warnings);
            }
            for (index, pattern) in settings.extra_patterns.iter().enumerate() {
                Self::compile(PatternId::Custom(index), pattern, &mut patterns, &mut warnings);
            }
        }

        let filter = Self {
            blocked,
            patterns,
            mask_char: settings.replacement_char,
        };
        (filter, warnings)
    }

    fn compile(
        id: PatternId,
        pattern: &str,
        patterns: &mut Vec<(PatternId, Regex)>,
        warnings: &mut Vec<ConfigWarning>,
    ) {
        match Regex::new(pattern) {
            Ok(regex) => patterns.push((id, regex)),
            Err(e) => {
                warn!("skipping invalid filter pattern '{pattern}': {e}");
                warnings.push(ConfigWarning::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Replace every occurrence of `needle` in `haystack` (both as chars,
    /// haystack pre-lowered) with the mask char, in `output`.
    fn mask_occurrences(output: &mut [char], haystack: &[char], needle: &[char], mask: char) {
        if needle.is_empty() || needle.len() > haystack.len() {
            return;
        }
        let mut i = 0;
        while i + needle.len() <= haystack.len() {
            if &haystack[i..i + needle.len()] == needle {
                for slot in &mut output[i..i + needle.len()] {
                    *slot = mask;
                }
                i += needle.len();
            } else {
                i += 1;
            }
        }
    }
}

impl MessageScanner for ContentFilter {
    fn scan(&self, text: &str) -> Result<ScanReport> {
        // Per-char lowering keeps indices aligned with the original text.
        let lower_chars: Vec<char> = text
            .chars()
            .map(|c| c.to_lowercase().next().unwrap_or(c))
            .collect();
        let lower: String = lower_chars.iter().collect();

        let mut matched_words = BTreeSet::new();
        let mut output: Vec<char> = text.chars().collect();

        for word in &self.blocked {
            if lower.contains(word.as_str()) {
                matched_words.insert(word.clone());
                let needle: Vec<char> = word.chars().collect();
                Self::mask_occurrences(&mut output, &lower_chars, &needle, self.mask_char);
            }
        }

        let matched_patterns = self
            .patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(id, _)| *id)
            .collect();

        Ok(ScanReport {
            matched_words,
            matched_patterns,
            filtered_text: output.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(blocked: &[&str], allowed: &[&str]) -> ContentFilter {
        let settings = FilterSettings {
            blocked_words: blocked.iter().map(|s| s.to_string()).collect(),
            allowed_words: allowed.iter().map(|s| s.to_string()).collect(),
            ..FilterSettings::default()
        };
        let (filter, warnings) = ContentFilter::from_settings(&settings);
        assert!(warnings.is_empty());
        filter
    }

    #[test]
    fn blocked_word_is_masked_to_equal_length() {
        let filter = filter_with(&["shoot"], &[]);
        let report = filter.scan("please shoot less").unwrap();
        assert_eq!(report.filtered_text, "please ***** less");
        assert!(report.matched_words.contains("shoot"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let filter = filter_with(&["shoot"], &[]);
        let report = filter.scan("ShOoT first").unwrap();
        assert_eq!(report.filtered_text, "***** first");
    }

    #[test]
    fn allowlist_always_wins() {
        let filter = filter_with(&["shoot", "dang"], &["shoot"]);
        let report = filter.scan("shoot, dang it").unwrap();
        assert_eq!(report.filtered_text, "shoot, **** it");
        assert!(!report.matched_words.contains("shoot"));
        assert!(report.matched_words.contains("dang"));
    }

    #[test]
    fn ip_addresses_are_advertising() {
        let filter = filter_with(&[], &[]);
        let report = filter.scan("connect to 192.168.1.1 right now").unwrap();
        assert!(report.matched_patterns.contains(&PatternId::IpAddress));
    }

    #[test]
    fn bare_domains_are_advertising() {
        let filter = filter_with(&[], &[]);
        let report = filter.scan("WIN FREE STUFF visit scam-site.com now").unwrap();
        assert!(report.matched_patterns.contains(&PatternId::Domain));
        // Pattern matches are never masked.
        assert_eq!(report.filtered_text, "WIN FREE STUFF visit scam-site.com now");
    }

    #[test]
    fn invite_links_are_advertising() {
        let filter = filter_with(&[], &[]);
        let report = filter.scan("join Discord.GG/abc123").unwrap();
        assert!(report.matched_patterns.contains(&PatternId::Invite));
    }

    #[test]
    fn plain_chat_matches_nothing() {
        let filter = filter_with(&["shoot"], &[]);
        let report = filter.scan("good game everyone, well played").unwrap();
        assert!(report.matched_words.is_empty());
        assert!(report.matched_patterns.is_empty());
        assert_eq!(report.filtered_text, "good game everyone, well played");
    }

    #[test]
    fn invalid_pattern_is_skipped_with_warning() {
        let settings = FilterSettings {
            extra_patterns: vec!["[".to_string(), r"free-\w+\.biz".to_string()],
            ..FilterSettings::default()
        };
        let (filter, warnings) = ContentFilter::from_settings(&settings);
        assert_eq!(warnings.len(), 1);

        // The valid custom pattern still works.
        let report = filter.scan("grab loot at free-gold.biz").unwrap();
        assert!(report.matched_patterns.contains(&PatternId::Custom(1)));
    }

    #[test]
    fn disabled_advertising_compiles_no_patterns() {
        let settings = FilterSettings {
            advertising_enabled: false,
            ..FilterSettings::default()
        };
        let (filter, _) = ContentFilter::from_settings(&settings);
        let report = filter.scan("visit scam-site.com").unwrap();
        assert!(report.matched_patterns.is_empty());
    }

    #[test]
    fn disabled_profanity_keeps_words_unmasked() {
        let settings = FilterSettings {
            profanity_enabled: false,
            blocked_words: vec!["shoot".to_string()],
            ..FilterSettings::default()
        };
        let (filter, _) = ContentFilter::from_settings(&settings);
        let report = filter.scan("shoot happens").unwrap();
        assert_eq!(report.filtered_text, "shoot happens");
        assert!(report.matched_words.is_empty());
    }
}
