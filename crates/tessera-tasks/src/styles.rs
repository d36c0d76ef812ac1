//! The `css:main` and `css:vendor` tasks.
//!
//! SCSS is compiled with grass, then lightningcss adds vendor prefixes for the
//! configured browsers and produces the minified output with an inline map.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::config::Project;
use crate::globs::GlobSet;
use crate::output::{destination, write_file};
use crate::task::{finish, report_file_error, Bundle, Task, TaskError, TaskName, TaskOutput};

/// Compiles one stylesheet bundle.
#[derive(Debug)]
pub struct StyleTask {
    bundle: Bundle,
}

impl StyleTask {
    pub fn new(bundle: Bundle) -> Self {
        Self { bundle }
    }
}

impl Task for StyleTask {
    fn name(&self) -> TaskName {
        match self.bundle {
            Bundle::Main => TaskName::CssMain,
            Bundle::Vendor => TaskName::CssVendor,
        }
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let paths = project.paths();
        let (entry, title) = match self.bundle {
            Bundle::Main => (&paths.app.scss.main, "CSS:main_size"),
            Bundle::Vendor => (&paths.app.scss.vendor, "CSS:vendor_size"),
        };

        let sources = GlobSet::single(entry)?;
        let files = sources.expand(&project.root)?;
        let base = project.root.join(sources.base());
        let tmp_dir = project.resolve(&paths.tmp.css);
        let dist_dir = project.resolve(&paths.dist.css);

        if files.is_empty() {
            tracing::info!("[{}] No stylesheet at {}", self.name(), entry);
        }

        let pipeline = StylePipeline::new(&project.settings.css.browsers)
            .map_err(|message| TaskError::Style {
                path: Path::new(entry).to_path_buf(),
                message,
            })?;

        let mut output = TaskOutput::with_report(title);
        let mut failed = 0;

        for file in &files {
            let css_name = file.with_extension("css");
            let tmp = destination(&css_name, &base, &tmp_dir);
            let dist = destination(&css_name, &base, &dist_dir);

            let result = compile_scss(file).and_then(|css| {
                let file_name = css_name
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("style.css");
                pipeline
                    .process(file_name, &css)
                    .map_err(|message| TaskError::Style {
                        path: file.clone(),
                        message,
                    })
            });

            let processed = match result {
                Ok(processed) => processed,
                Err(e) => {
                    report_file_error(self.name(), &e);
                    failed += 1;
                    continue;
                }
            };

            write_file(&tmp, &processed.expanded)?;
            write_file(&dist, &processed.minified)?;
            output.record_intermediate(tmp);
            output.record(dist, processed.minified.len());
        }

        finish(output, failed, files.len())
    }
}

/// Compile an SCSS file; imports resolve relative to its directory.
pub fn compile_scss(path: &Path) -> Result<String, TaskError> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(dir) = path.parent() {
        options = options.load_path(dir);
    }

    grass::from_path(path, &options).map_err(|e| TaskError::Style {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Prefixed debug output and minified output of one stylesheet.
#[derive(Debug)]
pub struct ProcessedCss {
    /// Prefixed, readable CSS.
    pub expanded: String,
    /// Prefixed, minified CSS ending in an inline source map comment.
    pub minified: String,
}

/// Vendor prefixing and minification for a set of browser targets.
#[derive(Debug, Clone, Copy)]
pub struct StylePipeline {
    targets: Targets,
}

impl StylePipeline {
    pub fn new(browsers: &[String]) -> Result<Self, String> {
        let targets = if browsers.is_empty() {
            Targets::default()
        } else {
            Browsers::from_browserslist(browsers.iter().map(String::as_str))
                .map_err(|e| format!("Invalid browsers query: {}", e))?
                .map(Targets::from)
                .unwrap_or_default()
        };
        Ok(Self { targets })
    }

    /// Prefix `css` and produce both outputs. `file_name` names the source
    /// in the map.
    pub fn process(&self, file_name: &str, css: &str) -> Result<ProcessedCss, String> {
        let mut stylesheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: file_name.to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| format!("CSS parse error: {}", e))?;

        stylesheet
            .minify(MinifyOptions {
                targets: self.targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| format!("CSS transform error: {}", e))?;

        let expanded = stylesheet
            .to_css(PrinterOptions {
                minify: false,
                targets: self.targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| format!("CSS print error: {}", e))?
            .code;

        let mut source_map = SourceMap::new("/");
        source_map.add_source(file_name);
        source_map
            .set_source_content(0, css)
            .map_err(|e| format!("Source map error: {:?}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                targets: self.targets,
                source_map: Some(&mut source_map),
                ..PrinterOptions::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?
            .code;

        let map_json = source_map
            .to_json(None)
            .map_err(|e| format!("Source map error: {:?}", e))?;

        Ok(ProcessedCss {
            expanded,
            minified: format!(
                "{}\n/*# sourceMappingURL=data:application/json;charset=utf-8;base64,{} */\n",
                minified,
                STANDARD.encode(map_json)
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pipeline() -> StylePipeline {
        StylePipeline::new(&["last 5 versions".to_string()]).unwrap()
    }

    #[test]
    fn compiles_scss_with_partials() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("_vars.scss"), "$brand: #ff0000;").unwrap();
        fs::write(
            temp.path().join("main.scss"),
            "@import 'vars';\n.nav { a { color: $brand; } }",
        )
        .unwrap();

        let css = compile_scss(&temp.path().join("main.scss")).unwrap();

        assert!(css.contains(".nav a"));
        assert!(css.contains("#ff0000") || css.contains("red"));
    }

    #[test]
    fn reports_scss_errors() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.scss");
        fs::write(&path, ".a { color: $missing; }").unwrap();

        assert!(matches!(
            compile_scss(&path),
            Err(TaskError::Style { .. })
        ));
    }

    #[test]
    fn adds_vendor_prefixes() {
        let processed = pipeline()
            .process("main.css", ".box { display: flex; user-select: none; }")
            .unwrap();

        assert!(processed.expanded.contains("-webkit-") || processed.expanded.contains("-ms-"));
    }

    #[test]
    fn minified_output_carries_inline_map() {
        let processed = pipeline()
            .process("main.css", ".a {\n  color: red;\n}\n\n.b {\n  margin: 0 0 0 0;\n}\n")
            .unwrap();

        assert!(processed
            .minified
            .contains("sourceMappingURL=data:application/json;charset=utf-8;base64,"));
        let css = processed.minified.lines().next().unwrap();
        assert!(css.len() < processed.expanded.len());
    }

    #[test]
    fn rejects_invalid_browser_query() {
        assert!(StylePipeline::new(&["not a real query ???".to_string()]).is_err());
    }
}
