//! Glob sets with `!` exclusions.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Errors raised while compiling or expanding globs.
#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("Invalid glob '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Project root is not valid UTF-8: {0}")]
    NonUtf8Root(PathBuf),
}

/// A list of include patterns and `!`-prefixed exclude patterns,
/// all relative to the project root.
#[derive(Debug, Clone)]
pub struct GlobSet {
    includes: Vec<(String, Pattern)>,
    excludes: Vec<Pattern>,
}

impl GlobSet {
    /// Compile a list of patterns. Patterns starting with `!` exclude.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref();
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let body = normalize(body);
            let pattern = Pattern::new(&body).map_err(|e| GlobError::Pattern {
                pattern: raw.to_string(),
                message: e.msg.to_string(),
            })?;

            if negated {
                excludes.push(pattern);
            } else {
                includes.push((body, pattern));
            }
        }

        Ok(Self { includes, excludes })
    }

    /// Single include pattern.
    pub fn single(pattern: &str) -> Result<Self, GlobError> {
        Self::new(&[pattern])
    }

    /// True if some include matches and no exclude does.
    pub fn matches(&self, relative: &Path) -> bool {
        self.includes
            .iter()
            .any(|(_, p)| p.matches_path_with(relative, MATCH_OPTIONS))
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }

    /// List matching regular files under `root`, sorted and de-duplicated.
    ///
    /// No matches is not an error.
    pub fn expand(&self, root: &Path) -> Result<Vec<PathBuf>, GlobError> {
        let root_str = root
            .to_str()
            .ok_or_else(|| GlobError::NonUtf8Root(root.to_path_buf()))?;
        let escaped_root = Pattern::escape(root_str.trim_end_matches('/'));

        let mut files = Vec::new();
        for (body, _) in &self.includes {
            let full = if escaped_root.is_empty() {
                body.clone()
            } else {
                format!("{}/{}", escaped_root, body)
            };

            let entries = glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| GlobError::Pattern {
                pattern: body.clone(),
                message: e.msg.to_string(),
            })?;

            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => {
                        let relative = path.strip_prefix(root).unwrap_or(&path);
                        if !self.is_excluded(relative) {
                            files.push(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Skipping unreadable path: {}", e),
                }
            }
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Glob parent of the first include pattern.
    pub fn base(&self) -> PathBuf {
        self.includes
            .first()
            .map(|(body, _)| glob_base(body))
            .unwrap_or_default()
    }

    /// Glob parents of every include pattern.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.includes.iter().map(|(b, _)| glob_base(b)).collect();
        roots.sort();
        roots.dedup();
        roots
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.excludes
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }
}

/// Leading path components that contain no wildcard.
///
/// A pattern naming a single file has its parent directory as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = normalize(pattern);
    let path = Path::new(&pattern);
    let mut base = PathBuf::new();
    let mut literal = true;

    let components: Vec<Component> = path.components().collect();
    for (i, component) in components.iter().enumerate() {
        let text = component.as_os_str().to_string_lossy();
        if text.contains(['*', '?', '[', '{']) {
            literal = false;
            break;
        }
        if i + 1 < components.len() {
            base.push(component);
        }
    }

    if literal {
        // A literal file path: its parent is the base.
        return path.parent().map(Path::to_path_buf).unwrap_or_default();
    }
    base
}

fn normalize(pattern: &str) -> String {
    pattern.trim_start_matches("./").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn base_stops_at_first_wildcard() {
        assert_eq!(glob_base("app/img/**/*.*"), PathBuf::from("app/img"));
        assert_eq!(glob_base("app/*.html"), PathBuf::from("app"));
        assert_eq!(glob_base("app/js/main.js"), PathBuf::from("app/js"));
        assert_eq!(glob_base("./app/fonts/**/*.*"), PathBuf::from("app/fonts"));
    }

    #[test]
    fn exclusion_removes_vendor_file() {
        let set = GlobSet::new(&["app/js/**/*.js", "!app/js/vendor.js"]).unwrap();

        assert!(set.matches(Path::new("app/js/main.js")));
        assert!(set.matches(Path::new("app/js/modules/menu.js")));
        assert!(!set.matches(Path::new("app/js/vendor.js")));
        assert!(!set.matches(Path::new("app/scss/main.scss")));
    }

    #[test]
    fn double_star_spans_zero_directories() {
        let set = GlobSet::single("app/**/*.html").unwrap();
        assert!(set.matches(Path::new("app/index.html")));
        assert!(set.matches(Path::new("app/partials/header.html")));
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let set = GlobSet::single("app/*.html").unwrap();
        assert!(set.matches(Path::new("app/index.html")));
        assert!(!set.matches(Path::new("app/partials/header.html")));
    }

    #[test]
    fn expands_sorted_files_and_skips_excluded() {
        let temp = tempdir().unwrap();
        let js = temp.path().join("app/js");
        fs::create_dir_all(js.join("lib")).unwrap();
        fs::write(js.join("main.js"), "").unwrap();
        fs::write(js.join("vendor.js"), "").unwrap();
        fs::write(js.join("lib/util.js"), "").unwrap();

        let set = GlobSet::new(&["app/js/**/*.js", "!app/js/vendor.js"]).unwrap();
        let files = set.expand(temp.path()).unwrap();

        assert_eq!(files, vec![js.join("lib/util.js"), js.join("main.js")]);
    }

    #[test]
    fn no_matches_is_empty() {
        let temp = tempdir().unwrap();
        let set = GlobSet::single("app/img/**/*.*").unwrap();
        assert!(set.expand(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_pattern() {
        assert!(GlobSet::single("app/[*.js").is_err());
    }
}
