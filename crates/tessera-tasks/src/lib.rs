//! Asset build tasks for tessera.
//!
//! Each task compiles one class of front-end source (markup, stylesheets,
//! scripts, images, sprites, fonts) from `app/` into `dist/`. The runner
//! resolves task dependencies into stages and runs them on tokio's blocking
//! pool.

pub mod clean;
pub mod config;
pub mod fonts;
pub mod globs;
pub mod graph;
pub mod html;
pub mod images;
pub mod include;
pub mod lint;
pub mod output;
pub mod report;
pub mod runner;
pub mod scripts;
pub mod sprites;
pub mod styles;
pub mod task;
pub mod watch;

pub use config::{ConfigError, PathTable, Project, ServerSettings, Settings};
pub use graph::{plan, Plan};
pub use report::SizeReport;
pub use runner::{Registry, RunSummary, TaskOutcome, TaskRunner, TaskStatus};
pub use task::{Bundle, Task, TaskError, TaskKind, TaskName, TaskOutput};
pub use watch::{is_css_only, tasks_for, watch_roots, watch_rules, WatchRule};
