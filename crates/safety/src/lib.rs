//! Prohibited-content screening for campaign messages.
//!
//! Matching is case-insensitive and word-boundary aware against a
//! configurable term list. Whether a flag blocks the pipeline or is
//! only recorded in the report is decided by [`SafetyPolicy`], not
//! here.

use creative_core::config::{SafetyConfig, SafetyPolicy};
use creative_core::error::{PipelineError, PipelineResult};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many characters of surrounding text each match carries.
const CONTEXT_RADIUS: usize = 30;

/// One prohibited-term hit in a scanned message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyMatch {
    pub term: String,
    /// Excerpt of the message around the match.
    pub context: String,
    /// Configured replacement, empty when none is configured.
    pub suggestion: String,
}

/// Outcome of scanning one message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyReport {
    pub flagged: bool,
    pub matches: Vec<SafetyMatch>,
}

struct CompiledTerm {
    term: String,
    pattern: regex::Regex,
    suggestion: String,
}

/// Scans campaign messages against the configured prohibited-term list.
pub struct ContentSafetyFilter {
    terms: Vec<CompiledTerm>,
    policy: SafetyPolicy,
}

impl ContentSafetyFilter {
    pub fn new(config: &SafetyConfig) -> PipelineResult<Self> {
        let mut terms = Vec::with_capacity(config.prohibited_terms.len());
        for (term, suggestion) in &config.prohibited_terms {
            // \b only anchors next to word characters; terms that start
            // or end with punctuation ("100%") get a bare boundary there.
            let escaped = regex::escape(term);
            let left = if term.starts_with(|c: char| c.is_alphanumeric()) {
                r"\b"
            } else {
                ""
            };
            let right = if term.ends_with(|c: char| c.is_alphanumeric()) {
                r"\b"
            } else {
                ""
            };
            let pattern = RegexBuilder::new(&format!("{left}{escaped}{right}"))
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    PipelineError::Config(format!("invalid prohibited term '{term}': {e}"))
                })?;
            terms.push(CompiledTerm {
                term: term.clone(),
                pattern,
                suggestion: suggestion.clone(),
            });
        }
        Ok(Self {
            terms,
            policy: config.policy,
        })
    }

    pub fn policy(&self) -> SafetyPolicy {
        self.policy
    }

    /// Scan a message for prohibited terms.
    pub fn scan(&self, message: &str) -> SafetyReport {
        let mut matches = Vec::new();
        for compiled in &self.terms {
            for m in compiled.pattern.find_iter(message) {
                matches.push(SafetyMatch {
                    term: compiled.term.clone(),
                    context: excerpt(message, m.start(), m.end()),
                    suggestion: compiled.suggestion.clone(),
                });
            }
        }
        if !matches.is_empty() {
            debug!(count = matches.len(), "prohibited terms matched");
        }
        SafetyReport {
            flagged: !matches.is_empty(),
            matches,
        }
    }
}

/// Cut a readable window around `[start, end)`, respecting char
/// boundaries.
fn excerpt(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(CONTEXT_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    let mut out = String::new();
    if from > 0 {
        out.push_str("...");
    }
    out.push_str(&text[from..to]);
    if to < text.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn filter_with(terms: &[(&str, &str)]) -> ContentSafetyFilter {
        let config = SafetyConfig {
            policy: SafetyPolicy::Block,
            prohibited_terms: terms
                .iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect::<HashMap<_, _>>(),
        };
        ContentSafetyFilter::new(&config).unwrap()
    }

    // 1. Case-insensitive word-boundary matching ----------------------------

    #[test]
    fn test_flags_term_regardless_of_case() {
        let filter = filter_with(&[("guaranteed", "reliable")]);
        let report = filter.scan("Absolutely GUARANTEED results or your money back");
        assert!(report.flagged);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].term, "guaranteed");
        assert_eq!(report.matches[0].suggestion, "reliable");
        assert!(report.matches[0].context.contains("GUARANTEED"));
    }

    #[test]
    fn test_word_boundary_prevents_substring_match() {
        let filter = filter_with(&[("cure", "improve")]);
        let report = filter.scan("A secure and accurate solution");
        assert!(!report.flagged);
        assert!(report.matches.is_empty());
    }

    // 2. Suggestions --------------------------------------------------------

    #[test]
    fn test_empty_suggestion_when_none_configured() {
        let filter = filter_with(&[("100%", "")]);
        let report = filter.scan("Enjoy 100% satisfaction");
        assert!(report.flagged);
        assert!(report.matches[0].suggestion.is_empty());
    }

    #[test]
    fn test_multi_word_term() {
        let filter = filter_with(&[("free money", "great value")]);
        let report = filter.scan("It's basically Free Money for everyone");
        assert!(report.flagged);
        assert_eq!(report.matches[0].suggestion, "great value");
    }

    // 3. Clean messages -----------------------------------------------------

    #[test]
    fn test_clean_message_not_flagged() {
        let filter = ContentSafetyFilter::new(&SafetyConfig::default()).unwrap();
        let report = filter.scan("Light up your summer nights");
        assert!(!report.flagged);
    }

    #[test]
    fn test_default_terms_include_guaranteed() {
        let filter = ContentSafetyFilter::new(&SafetyConfig::default()).unwrap();
        let report = filter.scan("guaranteed results every time");
        assert!(report.flagged);
        let m = report
            .matches
            .iter()
            .find(|m| m.term == "guaranteed")
            .unwrap();
        assert!(!m.suggestion.is_empty());
    }

    #[test]
    fn test_excerpt_truncation_markers() {
        let filter = filter_with(&[("miracle", "remarkable")]);
        let long = format!("{} miracle {}", "a".repeat(100), "b".repeat(100));
        let report = filter.scan(&long);
        let ctx = &report.matches[0].context;
        assert!(ctx.starts_with("..."));
        assert!(ctx.ends_with("..."));
    }
}
