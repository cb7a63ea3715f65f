//! PII scrubbing for full-fidelity trace bodies.
//!
//! An explicit ordered sequence of regex detectors, each with a masking
//! policy. Order is part of the configuration: the scrubbed output is
//! byte-identical across runs for a given body and pattern set, because
//! the envelope engine signs the output and re-verification must be
//! reproducible.
//!
//! Detection is strictly what the patterns express; no semantic
//! inference. False negatives are a known, accepted limitation of the
//! rule-based approach.

use regex::Regex;
use serde_json::Value;

use crate::logging::structured::LogContext;

/// How a match is replaced.
#[derive(Debug, Clone)]
pub enum MaskPolicy {
    /// Replace the whole match with a fixed token, e.g. `[REDACTED]`.
    Redact(String),
    /// Keep the last `keep_last` characters, mask the rest with `*`.
    PartialMask { keep_last: usize },
    /// Replace with a structured placeholder naming the detector,
    /// e.g. `[EMAIL]`.
    Placeholder(String),
}

/// One ordered PII detector.
#[derive(Debug, Clone)]
pub struct PiiPattern {
    pub name: String,
    pub regex: Regex,
    pub policy: MaskPolicy,
}

impl PiiPattern {
    pub fn new(name: &str, pattern: &str, policy: MaskPolicy) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            regex: Regex::new(pattern)?,
            policy,
        })
    }
}

/// Per-run scrub report: match counts per detector, in pattern order.
#[derive(Debug, Default)]
pub struct PiiScrubReport {
    pub counts: Vec<(String, usize)>,
    pub fields_modified: usize,
}

impl PiiScrubReport {
    pub fn total_matches(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// Ordered scrubber over a pattern set.
#[derive(Debug, Clone)]
pub struct PiiScrubber {
    patterns: Vec<PiiPattern>,
}

impl PiiScrubber {
    /// Build a scrubber from an explicit ordered pattern set.
    pub fn new(patterns: Vec<PiiPattern>) -> Self {
        Self { patterns }
    }

    /// The default detector set: email, phone, IPv4, URL, SSN, credit
    /// card. Replaceable wholesale; the contract is ordering and
    /// determinism, not this particular list.
    pub fn default_patterns() -> Self {
        let patterns = vec![
            PiiPattern::new(
                "email",
                r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
                MaskPolicy::Placeholder("[EMAIL]".to_string()),
            ),
            PiiPattern::new(
                "phone",
                r"(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}",
                MaskPolicy::Placeholder("[PHONE]".to_string()),
            ),
            PiiPattern::new(
                "ipv4",
                r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
                MaskPolicy::Placeholder("[IP_ADDRESS]".to_string()),
            ),
            PiiPattern::new(
                "url",
                r"https?://[^\s<>]+",
                MaskPolicy::Placeholder("[URL]".to_string()),
            ),
            PiiPattern::new(
                "ssn",
                r"\b\d{3}-\d{2}-\d{4}\b",
                MaskPolicy::Redact("[REDACTED]".to_string()),
            ),
            PiiPattern::new(
                "credit_card",
                r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
                MaskPolicy::PartialMask { keep_last: 4 },
            ),
        ];

        // Patterns are compile-time literals; construction cannot fail.
        Self::new(patterns.into_iter().collect::<Result<Vec<_>, _>>().unwrap())
    }

    pub fn pattern_names(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.name.as_str()).collect()
    }

    /// Scrub a full trace body. Every string value is run through every
    /// pattern in order.
    pub fn scrub(&self, body: &Value, ctx: &LogContext) -> (Value, PiiScrubReport) {
        let mut report = PiiScrubReport {
            counts: self.patterns.iter().map(|p| (p.name.clone(), 0)).collect(),
            fields_modified: 0,
        };

        let scrubbed = self.scrub_value(body, &mut report);

        if report.total_matches() > 0 {
            log::info!(
                "{} PII_SCRUBBED matches={:?} fields_modified={}",
                ctx,
                report.counts,
                report.fields_modified
            );
        } else {
            log::debug!("{} PII_SCRUB_CLEAN", ctx);
        }

        (scrubbed, report)
    }

    fn scrub_value(&self, value: &Value, report: &mut PiiScrubReport) -> Value {
        match value {
            Value::String(s) => {
                let scrubbed = self.scrub_string(s, report);
                if scrubbed != *s {
                    report.fields_modified += 1;
                }
                Value::String(scrubbed)
            }
            Value::Array(arr) => {
                Value::Array(arr.iter().map(|v| self.scrub_value(v, report)).collect())
            }
            Value::Object(obj) => {
                let mut scrubbed = serde_json::Map::new();
                for (key, val) in obj {
                    scrubbed.insert(key.clone(), self.scrub_value(val, report));
                }
                Value::Object(scrubbed)
            }
            _ => value.clone(),
        }
    }

    /// Apply each pattern in order to a string.
    pub fn scrub_string(&self, s: &str, report: &mut PiiScrubReport) -> String {
        // A fresh report has no counters yet; size them to the pattern set.
        if report.counts.len() != self.patterns.len() {
            report.counts = self.patterns.iter().map(|p| (p.name.clone(), 0)).collect();
        }

        let mut current = s.to_string();

        for (i, pattern) in self.patterns.iter().enumerate() {
            let matches = pattern.regex.find_iter(&current).count();
            if matches == 0 {
                continue;
            }
            report.counts[i].1 += matches;

            current = match &pattern.policy {
                MaskPolicy::Redact(token) | MaskPolicy::Placeholder(token) => pattern
                    .regex
                    .replace_all(&current, token.as_str())
                    .into_owned(),
                MaskPolicy::PartialMask { keep_last } => {
                    let keep = *keep_last;
                    pattern
                        .regex
                        .replace_all(&current, |caps: &regex::Captures<'_>| {
                            partial_mask(&caps[0], keep)
                        })
                        .into_owned()
                }
            };
        }

        current
    }
}

/// Mask all but the last `keep_last` characters of a match.
fn partial_mask(matched: &str, keep_last: usize) -> String {
    let chars: Vec<char> = matched.chars().collect();
    if chars.len() <= keep_last {
        return "*".repeat(chars.len());
    }
    let masked: String = "*".repeat(chars.len() - keep_last);
    let kept: String = chars[chars.len() - keep_last..].iter().collect();
    format!("{}{}", masked, kept)
}
