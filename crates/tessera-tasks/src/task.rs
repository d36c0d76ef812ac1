//! Task names, the task trait and task results.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::Project;
use crate::globs::GlobError;
use crate::report::SizeReport;

/// Every task that can be invoked by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Html,
    CssMain,
    CssVendor,
    JsMain,
    JsVendor,
    Img,
    Sprites,
    Fonts,
    Dist,
    Watch,
    Webserver,
    Clean,
    Default,
}

impl TaskName {
    pub const ALL: [TaskName; 13] = [
        TaskName::Html,
        TaskName::CssMain,
        TaskName::CssVendor,
        TaskName::JsMain,
        TaskName::JsVendor,
        TaskName::Img,
        TaskName::Sprites,
        TaskName::Fonts,
        TaskName::Dist,
        TaskName::Watch,
        TaskName::Webserver,
        TaskName::Clean,
        TaskName::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Html => "html",
            TaskName::CssMain => "css:main",
            TaskName::CssVendor => "css:vendor",
            TaskName::JsMain => "js:main",
            TaskName::JsVendor => "js:vendor",
            TaskName::Img => "img",
            TaskName::Sprites => "sprites",
            TaskName::Fonts => "fonts",
            TaskName::Dist => "dist",
            TaskName::Watch => "watch",
            TaskName::Webserver => "webserver",
            TaskName::Clean => "clean",
            TaskName::Default => "default",
        }
    }

    /// How the task is executed.
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskName::Dist => TaskKind::Group,
            TaskName::Watch | TaskName::Webserver => TaskKind::Service,
            TaskName::Default => TaskKind::Composite,
            _ => TaskKind::Build,
        }
    }

    /// Tasks that must complete before this one starts.
    pub fn dependencies(&self) -> &'static [TaskName] {
        match self {
            TaskName::Dist => &[
                TaskName::Html,
                TaskName::Sprites,
                TaskName::CssMain,
                TaskName::CssVendor,
                TaskName::JsMain,
                TaskName::JsVendor,
                TaskName::Img,
                TaskName::Fonts,
            ],
            TaskName::Webserver => &[TaskName::Sprites, TaskName::Img],
            TaskName::Default => &[TaskName::Clean],
            _ => &[],
        }
    }

    /// Tasks started once the dependencies of a composite task are done.
    pub fn starts(&self) -> &'static [TaskName] {
        match self {
            TaskName::Default => &[TaskName::Dist, TaskName::Webserver, TaskName::Watch],
            _ => &[],
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TaskError::UnknownTask(s.to_string()))
    }
}

/// Execution class of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Runs to completion and writes files.
    Build,
    /// Only aggregates dependencies.
    Group,
    /// Long-running (server, watchers).
    Service,
    /// Runs dependencies, then starts other tasks.
    Composite,
}

/// Entry point selector for the stylesheet and script tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bundle {
    Main,
    Vendor,
}

/// Errors that can occur while running a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task '{0}' is not a build task")]
    NotBuildable(TaskName),

    #[error("Dependency cycle at '{0}'")]
    Cycle(TaskName),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("Include error in {path}: {message}")]
    Include { path: PathBuf, message: String },

    #[error("Stylesheet error in {path}: {message}")]
    Style { path: PathBuf, message: String },

    #[error("Script error in {path}: {message}")]
    Script { path: PathBuf, message: String },

    #[error("Image error in {path}: {message}")]
    Image { path: PathBuf, message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Refusing to remove {0}: not inside the project root")]
    UnsafeClean(PathBuf),

    #[error("{failed} of {total} files failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Files written by a task plus its size report.
#[derive(Debug, Default)]
pub struct TaskOutput {
    pub written: Vec<PathBuf>,
    pub report: Option<SizeReport>,
}

impl TaskOutput {
    pub fn with_report(title: &str) -> Self {
        Self {
            written: Vec::new(),
            report: Some(SizeReport::new(title)),
        }
    }

    /// Record a file written to a distribution directory.
    pub fn record(&mut self, path: PathBuf, bytes: usize) {
        if let Some(report) = &mut self.report {
            report.add(bytes);
        }
        self.written.push(path);
    }

    /// Record an intermediate file; not counted in the size report.
    pub fn record_intermediate(&mut self, path: PathBuf) {
        self.written.push(path);
    }
}

/// A unit of build work.
pub trait Task: Send + Sync {
    /// Name used to invoke the task.
    fn name(&self) -> TaskName;

    /// Run the task to completion.
    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError>;
}

/// Log a per-file failure so the remaining files still get processed.
pub(crate) fn report_file_error(task: TaskName, error: &TaskError) {
    tracing::error!("[{}] {}", task, error);
}

/// Finish a multi-file task: a task with failed files fails as a whole.
pub(crate) fn finish(output: TaskOutput, failed: usize, total: usize) -> Result<TaskOutput, TaskError> {
    if failed > 0 {
        return Err(TaskError::PartialFailure { failed, total });
    }
    if let Some(report) = &output.report {
        report.log();
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for task in TaskName::ALL {
            assert_eq!(task.as_str().parse::<TaskName>().unwrap(), task);
        }
    }

    #[test]
    fn rejects_unknown_name() {
        assert!(matches!(
            "css".parse::<TaskName>(),
            Err(TaskError::UnknownTask(name)) if name == "css"
        ));
    }

    #[test]
    fn dist_depends_on_every_asset_task() {
        let deps = TaskName::Dist.dependencies();
        assert_eq!(deps.len(), 8);
        assert!(deps.contains(&TaskName::Sprites));
        assert!(!deps.contains(&TaskName::Clean));
    }

    #[test]
    fn webserver_waits_for_images() {
        assert_eq!(
            TaskName::Webserver.dependencies(),
            &[TaskName::Sprites, TaskName::Img]
        );
        assert_eq!(TaskName::Webserver.kind(), TaskKind::Service);
    }

    #[test]
    fn default_cleans_then_starts_services() {
        assert_eq!(TaskName::Default.dependencies(), &[TaskName::Clean]);
        assert_eq!(
            TaskName::Default.starts(),
            &[TaskName::Dist, TaskName::Webserver, TaskName::Watch]
        );
    }
}
