//! PII detection and masking.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const MASK_TOKEN: &str = "[REDACTED]";

/// Upper bound on masking passes, for custom patterns that match their own token.
const MAX_MASK_PASSES: usize = 8;

static DEFAULT_PATTERNS: Lazy<Vec<(String, Regex)>> = Lazy::new(|| {
    [
        ("email", r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+"),
        (
            "phone",
            r"\b(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        ),
        ("credit_card", r"\b(?:\d[ -]*?){13,16}\b"),
        ("cpf", r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name.to_string(), re)))
    .collect()
});

/// Masks personal data before it reaches a backend.
pub trait PiiMasker: Send + Sync {
    fn mask(&self, text: &str) -> String;
}

/// A single detected PII span (byte offsets into the scanned text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PiiMatch {
    pub kind: String,
    pub start: usize,
    pub end: usize,
    pub value: String,
}

/// Regex-based PII processor.
#[derive(Debug, Clone)]
pub struct PiiProcessor {
    patterns: Vec<(String, Regex)>,
    mask_token: String,
}

impl Default for PiiProcessor {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
            mask_token: MASK_TOKEN.to_string(),
        }
    }
}

impl PiiProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processor with custom named patterns.
    pub fn with_patterns(patterns: Vec<(String, Regex)>) -> Self {
        Self {
            patterns,
            mask_token: MASK_TOKEN.to_string(),
        }
    }

    pub fn with_mask_token(mut self, token: impl Into<String>) -> Self {
        self.mask_token = token.into();
        self
    }

    fn mask_once(&self, text: &str) -> String {
        self.patterns.iter().fold(text.to_string(), |acc, (_, re)| {
            re.replace_all(&acc, self.mask_token.as_str()).into_owned()
        })
    }

    /// Replace every detected span with the mask token.
    ///
    /// Passes repeat until nothing changes, so masking an already masked text
    /// is a no-op even when one replacement exposes a new match. At most
    /// `MAX_MASK_PASSES` passes run.
    pub fn mask(&self, text: &str) -> String {
        let mut current = self.mask_once(text);
        for _ in 1..MAX_MASK_PASSES {
            let next = self.mask_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    pub fn detect(&self, text: &str) -> Vec<PiiMatch> {
        self.patterns
            .iter()
            .flat_map(|(kind, re)| {
                re.find_iter(text).map(move |m| PiiMatch {
                    kind: kind.clone(),
                    start: m.start(),
                    end: m.end(),
                    value: m.as_str().to_string(),
                })
            })
            .collect()
    }
}

impl PiiMasker for PiiProcessor {
    fn mask(&self, text: &str) -> String {
        PiiProcessor::mask(self, text)
    }
}
