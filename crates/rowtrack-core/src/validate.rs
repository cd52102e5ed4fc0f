//! Record validation.
//!
//! Sessions refuse to persist a collection that contains invalid records.
//! Entities opt into checks by overriding [`Validate::validate`]; the
//! [`rules`] module provides the common field checks.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

/// A single validation finding on a field.
#[derive(Debug, Clone)]
pub struct Issue {
    /// The field the finding is about
    pub field: &'static str,
    /// Human-readable message
    pub message: String,
}

impl Issue {
    /// Create a new finding.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Per-record validation hook, consulted before every save.
///
/// The default implementation accepts everything.
pub trait Validate {
    /// Check this record, returning one finding per violated rule.
    fn validate(&self) -> Vec<Issue> {
        Vec::new()
    }
}

/// Thread-safe cache for compiled regex patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime
/// of the program.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Fast path: already compiled. Recover from a poisoned lock, the
        // cache holds no partial state.
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        // Slow path: compile and cache
        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

/// Global regex cache singleton.
fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Reusable field checks for [`Validate`] implementations.
///
/// Each check appends at most one [`Issue`] to the caller's list.
pub mod rules {
    use super::{Issue, regex_cache};

    /// Require an optional field to carry a value.
    pub fn present<T>(issues: &mut Vec<Issue>, field: &'static str, value: &Option<T>) {
        if value.is_none() {
            issues.push(Issue::new(field, "is required"));
        }
    }

    /// Require a non-empty string.
    pub fn required(issues: &mut Vec<Issue>, field: &'static str, value: &str) {
        if value.is_empty() {
            issues.push(Issue::new(field, "must not be empty"));
        }
    }

    /// Require at least `min` characters.
    pub fn min_length(issues: &mut Vec<Issue>, field: &'static str, value: &str, min: usize) {
        let actual = value.chars().count();
        if actual < min {
            issues.push(Issue::new(
                field,
                format!("must be at least {min} characters, got {actual}"),
            ));
        }
    }

    /// Require at most `max` characters.
    pub fn max_length(issues: &mut Vec<Issue>, field: &'static str, value: &str, max: usize) {
        let actual = value.chars().count();
        if actual > max {
            issues.push(Issue::new(
                field,
                format!("must be at most {max} characters, got {actual}"),
            ));
        }
    }

    /// Require a value within `[min, max]`.
    pub fn range(issues: &mut Vec<Issue>, field: &'static str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            issues.push(Issue::new(
                field,
                format!("must be between {min} and {max}, got {value}"),
            ));
        }
    }

    /// Require the value to match a regex pattern.
    ///
    /// An invalid pattern logs a warning and counts as a non-match.
    pub fn matches(issues: &mut Vec<Issue>, field: &'static str, value: &str, pattern: &str) {
        let matched = match regex_cache().get_or_compile(pattern) {
            Ok(regex) => regex.is_match(value),
            Err(e) => {
                tracing::warn!(
                    pattern = pattern,
                    error = %e,
                    "invalid regex pattern in validation, treating as non-match"
                );
                false
            }
        };
        if !matched {
            issues.push(Issue::new(
                field,
                format!("must match pattern '{pattern}'"),
            ));
        }
    }
}
