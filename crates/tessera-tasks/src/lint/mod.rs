//! Markup and script linters.
//!
//! Linters only report. A file with violations is still built.

pub mod html;
pub mod js;

use std::path::{Path, PathBuf};

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Rule identifier, e.g. `tag-pair`
    pub rule: &'static str,
    /// 1-based line, 0 when unknown
    pub line: usize,
    pub message: String,
}

impl Violation {
    pub fn new(rule: &'static str, line: usize, message: impl Into<String>) -> Self {
        Self {
            rule,
            line,
            message: message.into(),
        }
    }
}

/// Violations found in one file.
#[derive(Debug, Clone)]
pub struct LintReport {
    pub path: PathBuf,
    pub violations: Vec<Violation>,
}

impl LintReport {
    pub fn new(path: &Path, violations: Vec<Violation>) -> Self {
        Self {
            path: path.to_path_buf(),
            violations,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }

    /// Print every violation at warn level.
    pub fn log(&self) {
        for v in &self.violations {
            tracing::warn!(
                "{}:{}: {} [{}]",
                self.path.display(),
                v.line,
                v.message,
                v.rule
            );
        }
        if !self.is_clean() {
            tracing::warn!(
                "{}: {} lint warning(s)",
                self.path.display(),
                self.violations.len()
            );
        }
    }
}

/// Byte offset to 1-based line number.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub(crate) fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_offsets_to_lines() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.line(0), 1);
        assert_eq!(index.line(1), 1);
        assert_eq!(index.line(3), 2);
        assert_eq!(index.line(6), 3);
        assert_eq!(index.line(7), 4);
    }
}
