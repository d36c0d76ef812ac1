//! The `js:main` and `js:vendor` tasks.

use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::config::Project;
use crate::globs::GlobSet;
use crate::include::expand_file;
use crate::lint::{self, LintReport};
use crate::output::{destination, write_file};
use crate::task::{finish, report_file_error, Bundle, Task, TaskError, TaskName, TaskOutput};

/// Concatenates, lints and minifies one script bundle.
///
/// Only the main bundle is linted; vendor code is taken as-is.
#[derive(Debug)]
pub struct ScriptTask {
    bundle: Bundle,
}

impl ScriptTask {
    pub fn new(bundle: Bundle) -> Self {
        Self { bundle }
    }
}

impl Task for ScriptTask {
    fn name(&self) -> TaskName {
        match self.bundle {
            Bundle::Main => TaskName::JsMain,
            Bundle::Vendor => TaskName::JsVendor,
        }
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let paths = project.paths();
        let (entry, title) = match self.bundle {
            Bundle::Main => (&paths.app.js.main, "JS:main_size"),
            Bundle::Vendor => (&paths.app.js.vendor, "JS:vendor_size"),
        };

        let sources = GlobSet::single(entry)?;
        let files = sources.expand(&project.root)?;
        let base = project.root.join(sources.base());
        let tmp_dir = project.resolve(&paths.tmp.js);
        let dist_dir = project.resolve(&paths.dist.js);

        if files.is_empty() {
            tracing::info!("[{}] No script at {}", self.name(), entry);
        }

        let mut output = TaskOutput::with_report(title);
        let mut failed = 0;

        for file in &files {
            let tmp = destination(file, &base, &tmp_dir);
            let dist = destination(file, &base, &dist_dir);

            let source = match expand_file(file) {
                Ok(source) => source,
                Err(e) => {
                    report_file_error(self.name(), &e);
                    failed += 1;
                    continue;
                }
            };

            if self.bundle == Bundle::Main {
                LintReport::new(file, lint::js::lint(&source)).log();
            }

            write_file(&tmp, &source)?;
            output.record_intermediate(tmp);

            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("script.js");
            match minify_script(file_name, &source) {
                Ok(minified) => {
                    write_file(&dist, &minified)?;
                    output.record(dist, minified.len());
                }
                Err(message) => {
                    let e = TaskError::Script {
                        path: file.clone(),
                        message,
                    };
                    report_file_error(self.name(), &e);
                    failed += 1;
                }
            }
        }

        finish(output, failed, files.len())
    }
}

/// Compress and mangle a classic script, appending an inline source map.
///
/// Any syntax error aborts minification of the file.
pub fn minify_script(file_name: &str, source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        return Err(format!("Syntax error: {}", messages.join("; ")));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let mut options = CodegenOptions::minify();
    options.source_map_path = Some(PathBuf::from(file_name));

    let generated = Codegen::new()
        .with_options(options)
        .with_scoping(minified.scoping)
        .build(&program);

    let mut code = generated.code;
    if let Some(map) = generated.map {
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str("//# sourceMappingURL=");
        code.push_str(&map.to_data_url());
        code.push('\n');
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minifies_with_inline_map() {
        let source = r#"
function greet(personName) {
    var message = 'Hello, ' + personName + '!';
    console.log(message);
    return message;
}
greet('world');
"#;
        let out = minify_script("main.js", source).unwrap();

        assert!(out.contains("//# sourceMappingURL=data:application/json"));
        let code = out.lines().next().unwrap();
        assert!(code.len() < source.trim().len());
        assert!(code.contains("greet"));
    }

    #[test]
    fn syntax_errors_fail_the_file() {
        let err = minify_script("main.js", "function (").unwrap_err();
        assert!(err.starts_with("Syntax error"));
    }
}
