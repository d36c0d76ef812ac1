//! The `html` task: includes, lint, debug copy, minified copy.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use minify_html::Cfg;
use regex::{Captures, Regex};

use crate::config::{HtmlSettings, Project};
use crate::globs::GlobSet;
use crate::include::expand_file;
use crate::lint::{self, LintReport};
use crate::output::{destination, write_file};
use crate::task::{finish, report_file_error, Task, TaskError, TaskName, TaskOutput};

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

/// Builds every page matched by `paths.app.html`.
#[derive(Debug, Default)]
pub struct HtmlTask;

impl Task for HtmlTask {
    fn name(&self) -> TaskName {
        TaskName::Html
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let paths = project.paths();
        let sources = GlobSet::single(&paths.app.html)?;
        let files = sources.expand(&project.root)?;
        let base = project.root.join(sources.base());
        let tmp_dir = project.resolve(&paths.tmp.html);
        let dist_dir = project.resolve(&paths.dist.html);

        if files.is_empty() {
            tracing::info!("[html] No files match {}", paths.app.html);
        }

        let mut output = TaskOutput::with_report("HTML_size");
        let mut failed = 0;

        for file in &files {
            let page = Page {
                source: file,
                tmp: destination(file, &base, &tmp_dir),
                dist: destination(file, &base, &dist_dir),
            };
            match page.build(&project.settings.html) {
                Ok(size) => {
                    output.record_intermediate(page.tmp);
                    output.record(page.dist, size);
                }
                Err(e) => {
                    report_file_error(self.name(), &e);
                    failed += 1;
                }
            }
        }

        finish(output, failed, files.len())
    }
}

struct Page<'a> {
    source: &'a Path,
    tmp: PathBuf,
    dist: PathBuf,
}

impl Page<'_> {
    /// Returns the size of the minified page.
    fn build(&self, settings: &HtmlSettings) -> Result<usize, TaskError> {
        let expanded = expand_file(self.source)?;

        LintReport::new(self.source, lint::html::lint(&expanded)).log();

        write_file(&self.tmp, &expanded)?;

        let minified = minify(&expanded, settings);
        write_file(&self.dist, &minified)?;
        Ok(minified.len())
    }
}

/// Minify a page.
///
/// With `conditionals`, IE conditional comments survive while other comments
/// are dropped. With `spare`, optional tags are kept.
pub fn minify(source: &str, settings: &HtmlSettings) -> String {
    let input = if settings.conditionals {
        strip_plain_comments(source)
    } else {
        source.to_string()
    };

    let cfg = Cfg {
        keep_comments: settings.conditionals,
        keep_closing_tags: settings.spare,
        keep_html_and_head_opening_tags: settings.spare,
        ..Cfg::default()
    };

    let minified = minify_html::minify(input.as_bytes(), &cfg);
    String::from_utf8_lossy(&minified).into_owned()
}

fn strip_plain_comments(source: &str) -> String {
    COMMENT
        .replace_all(source, |caps: &Captures| {
            let comment = &caps[0];
            if comment.starts_with("<!--[if") || comment.contains("[endif]") {
                comment.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_conditional_comments_only() {
        let html = r#"<!DOCTYPE html>
<html>
<head>
  <!-- regular comment -->
  <!--[if lt IE 9]><script src="js/html5shiv.js"></script><![endif]-->
</head>
<body>
  <p>   Hello   </p>
</body>
</html>
"#;
        let out = minify(html, &HtmlSettings::default());

        assert!(!out.contains("regular comment"));
        assert!(out.contains("[if lt IE 9]"));
        assert!(out.len() < html.len());
    }

    #[test]
    fn drops_all_comments_without_conditionals() {
        let settings = HtmlSettings {
            conditionals: false,
            spare: false,
        };
        let out = minify("<div><!--[if IE]>x<![endif]--><p>a</p></div>", &settings);
        assert!(!out.contains("[if IE]"));
    }
}
