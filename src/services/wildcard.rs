//! Wildcard pattern matching for restriction rules.
//!
//! Patterns use `*` (any run of characters, including none) and `?`
//! (exactly one character). Every other character is literal. Matching is
//! case-insensitive: both sides are upper-cased before comparison.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// How a wildcard pattern is anchored when converted to a regular expression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
    /// Always `^pattern$`.
    Strict,
    /// Drop `^` when the pattern starts with `*`, drop `$` when it ends with `*`.
    Conditional,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    compiled: Compiled,
}

#[derive(Debug, Clone)]
enum Compiled {
    Any,
    Regex(Regex),
    Never,
}

impl WildcardPattern {
    /// Compile a wildcard pattern. An empty pattern matches every candidate.
    pub fn compile(pattern: &str, mode: AnchorMode) -> Self {
        if pattern.is_empty() {
            return Self {
                source: String::new(),
                compiled: Compiled::Any,
            };
        }

        let expression = to_regex(&pattern.to_uppercase(), mode);
        tracing::trace!(pattern, expression = %expression, "Compiled wildcard pattern");

        let compiled = match RegexBuilder::new(&expression)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            Ok(re) => Compiled::Regex(re),
            Err(e) => {
                // Literals are escaped, so this only fires on regex engine limits.
                tracing::warn!(pattern, error = %e, "Wildcard pattern rejected by regex engine");
                Compiled::Never
            }
        };

        Self {
            source: pattern.to_string(),
            compiled,
        }
    }

    /// Check a candidate string against the pattern.
    pub fn is_match(&self, candidate: &str) -> bool {
        let result = match &self.compiled {
            Compiled::Any => return true,
            Compiled::Never => false,
            Compiled::Regex(regex) => regex.is_match(&candidate.to_uppercase()),
        };
        tracing::debug!(
            pattern = %self.source,
            candidate,
            matched = result,
            "Wildcard match evaluated"
        );
        result
    }
}

/// Match `candidate` against `pattern` in one call.
pub fn matches(pattern: &str, candidate: &str, mode: AnchorMode) -> bool {
    WildcardPattern::compile(pattern, mode).is_match(candidate)
}

/// Convert a wildcard pattern into a regular expression string.
fn to_regex(pattern: &str, mode: AnchorMode) -> String {
    let mut body = String::with_capacity(pattern.len() * 2);
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => body.push_str(".*"),
            '?' => body.push('.'),
            other => body.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }

    let (anchor_start, anchor_end) = match mode {
        AnchorMode::Strict => (true, true),
        AnchorMode::Conditional => (!pattern.starts_with('*'), !pattern.ends_with('*')),
    };

    let mut expression = String::with_capacity(body.len() + 2);
    if anchor_start {
        expression.push('^');
    }
    expression.push_str(&body);
    if anchor_end {
        expression.push('$');
    }
    expression
}
