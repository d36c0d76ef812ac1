//! Mapping changed source files to the tasks that rebuild them.

use std::path::{Path, PathBuf};

use crate::config::PathTable;
use crate::globs::{GlobError, GlobSet};
use crate::task::TaskName;

/// Re-run `task` when a file matching `globs` changes.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pub task: TaskName,
    pub globs: GlobSet,
}

/// The watch rule table. Main bundles exclude their vendor entry so a vendor
/// edit only rebuilds the vendor bundle.
pub fn watch_rules(paths: &PathTable) -> Result<Vec<WatchRule>, GlobError> {
    let watch = &paths.watch;
    let table: [(TaskName, Vec<String>); 8] = [
        (TaskName::Html, vec![watch.html.clone()]),
        (
            TaskName::CssMain,
            vec![watch.scss.main.clone(), format!("!{}", watch.scss.vendor)],
        ),
        (TaskName::CssVendor, vec![watch.scss.vendor.clone()]),
        (
            TaskName::JsMain,
            vec![watch.js.main.clone(), format!("!{}", watch.js.vendor)],
        ),
        (TaskName::JsVendor, vec![watch.js.vendor.clone()]),
        (TaskName::Img, vec![watch.img.clone()]),
        (TaskName::Sprites, vec![watch.sprites.clone()]),
        (TaskName::Fonts, vec![watch.fonts.clone()]),
    ];

    table
        .into_iter()
        .map(|(task, patterns)| {
            Ok(WatchRule {
                task,
                globs: GlobSet::new(&patterns)?,
            })
        })
        .collect()
}

/// Tasks triggered by a change to `relative`, in rule order.
pub fn tasks_for(rules: &[WatchRule], relative: &Path) -> Vec<TaskName> {
    let relative = relative.strip_prefix(".").unwrap_or(relative);
    rules
        .iter()
        .filter(|rule| rule.globs.matches(relative))
        .map(|rule| rule.task)
        .collect()
}

/// Directories to subscribe to, relative to the project root.
///
/// Nested roots are dropped since watching is recursive.
pub fn watch_roots(rules: &[WatchRule]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = rules.iter().flat_map(|r| r.globs.roots()).collect();
    roots.sort();
    roots.dedup();

    let mut kept: Vec<PathBuf> = Vec::new();
    for root in roots {
        if !kept.iter().any(|k| root.starts_with(k)) {
            kept.push(root);
        }
    }
    kept
}

/// True if a batch of tasks only touches stylesheets.
pub fn is_css_only(tasks: &[TaskName]) -> bool {
    !tasks.is_empty()
        && tasks
            .iter()
            .all(|t| matches!(t, TaskName::CssMain | TaskName::CssVendor))
}
