//! Path-qualified validation errors
//!
//! A [`FieldError`] aggregates any number of individual field problems. Each
//! problem carries a message and the dotted paths it applies to. Errors are
//! merged with [`FieldError::also`] and re-rooted under a parent field with
//! [`FieldError::via_field`], so nested validators can report paths relative
//! to themselves and let the caller qualify them.
//!
//! The display form groups problems sharing a message, sorts and deduplicates
//! their paths, and prints one group per line:
//!
//! ```text
//! missing field(s): bucket, sink
//! ```

use std::collections::BTreeMap;
use std::fmt;

const MISSING_FIELD: &str = "missing field(s)";

/// A single problem reported against one or more field paths.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldProblem {
    message: String,
    paths: Vec<String>,
}

/// Aggregate of field-level validation problems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldError {
    problems: Vec<FieldProblem>,
}

impl FieldError {
    /// Reports the given paths as required but unset.
    pub fn missing_field<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MISSING_FIELD, paths)
    }

    /// Reports `value` as not acceptable at `path`.
    pub fn invalid_value(value: impl fmt::Display, path: impl Into<String>) -> Self {
        Self::new(format!("invalid value: {}", value), [path])
    }

    fn new<I, S>(message: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            problems: vec![FieldProblem {
                message: message.into(),
                paths: paths.into_iter().map(Into::into).collect(),
            }],
        }
    }

    /// Merges `other` into this error.
    pub fn also(mut self, other: FieldError) -> Self {
        self.problems.extend(other.problems);
        self
    }

    /// Qualifies every path with `field` as its parent.
    pub fn via_field(mut self, field: &str) -> Self {
        for problem in &mut self.problems {
            for path in &mut problem.paths {
                *path = if path.is_empty() {
                    field.to_string()
                } else if path.starts_with('[') {
                    format!("{}{}", field, path)
                } else {
                    format!("{}.{}", field, path)
                };
            }
        }
        self
    }

    /// True when no problems have been recorded.
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Every reported path, sorted and deduplicated.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .problems
            .iter()
            .flat_map(|p| p.paths.iter().cloned())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// `Ok(())` when empty, otherwise the aggregate as an error.
    pub fn into_result(self) -> Result<(), FieldError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Problems grouped by message, each with sorted unique paths.
    fn grouped(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for problem in &self.problems {
            groups
                .entry(problem.message.as_str())
                .or_default()
                .extend(problem.paths.iter().map(String::as_str));
        }
        for paths in groups.values_mut() {
            paths.sort_unstable();
            paths.dedup();
        }
        groups
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .grouped()
            .into_iter()
            .map(|(message, paths)| format!("{}: {}", message, paths.join(", ")))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for FieldError {}
