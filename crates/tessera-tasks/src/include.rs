//! File includes via `//= path` and `/*= path */` directives.
//!
//! A directive must be alone on its line. The referenced file is resolved
//! relative to the including file and expanded recursively, keeping the
//! directive's indentation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::output::read_text;
use crate::task::TaskError;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)(?://=[ \t]*(?P<line>\S+)|/\*=[ \t]*(?P<block>\S+)[ \t]*\*/)[ \t]*$")
        .expect("include directive pattern is valid")
});

/// Read `path` and expand its include directives.
pub fn expand_file(path: &Path) -> Result<String, TaskError> {
    let mut stack = Vec::new();
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    expand_inner(&path, &mut stack)
}

fn expand_inner(path: &Path, stack: &mut Vec<PathBuf>) -> Result<String, TaskError> {
    if stack.iter().any(|p| p == path) {
        let chain: Vec<String> = stack
            .iter()
            .chain(std::iter::once(&path.to_path_buf()))
            .map(|p| p.display().to_string())
            .collect();
        return Err(TaskError::Include {
            path: path.to_path_buf(),
            message: format!("include cycle: {}", chain.join(" -> ")),
        });
    }

    let source = read_text(path)?;
    let dir = path.parent().unwrap_or(Path::new(""));

    stack.push(path.to_path_buf());
    let mut out = String::with_capacity(source.len());

    for line in source.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let Some(caps) = DIRECTIVE.captures(body) else {
            out.push_str(line);
            continue;
        };

        let target = caps
            .name("line")
            .or_else(|| caps.name("block"))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let indent = caps.name("indent").map(|m| m.as_str()).unwrap_or_default();
        let target_path = dir.join(target);

        if !target_path.is_file() {
            stack.pop();
            return Err(TaskError::Include {
                path: path.to_path_buf(),
                message: format!("included file not found: {}", target_path.display()),
            });
        }

        // Cycles are detected on canonical paths, so `lib/../a.js` is `a.js`.
        let target_path = target_path
            .canonicalize()
            .map_err(|e| TaskError::io(&target_path, e))?;
        let included = expand_inner(&target_path, stack)?;
        for included_line in included.split_inclusive('\n') {
            if !included_line.trim().is_empty() {
                out.push_str(indent);
            }
            out.push_str(included_line);
        }
        if !included.ends_with('\n') && line.ends_with('\n') {
            out.push('\n');
        }
    }

    stack.pop();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn expands_nested_includes_with_indent() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        fs::create_dir_all(dir.join("partials")).unwrap();
        fs::write(
            dir.join("index.html"),
            "<body>\n  //= partials/header.html\n</body>\n",
        )
        .unwrap();
        fs::write(
            dir.join("partials/header.html"),
            "<header>\n/*= nav.html */\n</header>\n",
        )
        .unwrap();
        fs::write(dir.join("partials/nav.html"), "<nav></nav>").unwrap();

        let out = expand_file(&dir.join("index.html")).unwrap();

        assert_eq!(
            out,
            "<body>\n  <header>\n  <nav></nav>\n  </header>\n</body>\n"
        );
    }

    #[test]
    fn leaves_ordinary_comments_alone() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("main.js");
        fs::write(&file, "// regular comment\nvar a = 1; //= not a directive\n").unwrap();

        let out = expand_file(&file).unwrap();
        assert_eq!(out, "// regular comment\nvar a = 1; //= not a directive\n");
    }

    #[test]
    fn detects_cycles() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.js"), "//= b.js\n").unwrap();
        fs::write(temp.path().join("b.js"), "//= a.js\n").unwrap();

        let err = expand_file(&temp.path().join("a.js")).unwrap_err();
        assert!(err.to_string().contains("include cycle"));
    }

    #[test]
    fn detects_cycles_through_parent_segments() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(temp.path().join("a.js"), "//= lib/../a.js\n").unwrap();

        let err = expand_file(&temp.path().join("a.js")).unwrap_err();
        assert!(err.to_string().contains("include cycle"));
    }

    #[test]
    fn missing_include_is_an_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.js"), "//= missing.js\n").unwrap();

        let err = expand_file(&temp.path().join("a.js")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
