//! The watch session: re-runs tasks when their sources change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tessera_tasks::{
    is_css_only, tasks_for, watch_roots, watch_rules, RunSummary, TaskName, TaskRunner, WatchRule,
};
use tokio::sync::mpsc;

use crate::reload::{ReloadHub, ReloadMessage};
use crate::server::ServerError;
use crate::watcher::{FileWatcher, WatchEvent};

/// Window in which consecutive events are merged into one batch.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the sources of every incremental task.
///
/// Batches run one at a time. When a reload hub is attached, finished
/// batches refresh connected pages.
pub struct WatchSession {
    runner: TaskRunner,
    rules: Vec<WatchRule>,
    root: PathBuf,
    base_dir: PathBuf,
    hub: Option<ReloadHub>,
}

impl WatchSession {
    pub fn new(runner: TaskRunner) -> Result<Self, ServerError> {
        let project = runner.project();
        let rules =
            watch_rules(project.paths()).map_err(|e| ServerError::Watch(e.to_string()))?;
        let root = project
            .root
            .canonicalize()
            .unwrap_or_else(|_| project.root.clone());
        let base_dir = project.resolve(&project.settings.server.base_dir);

        Ok(Self {
            runner,
            rules,
            root,
            base_dir,
            hub: None,
        })
    }

    /// Push reload messages to pages connected to `hub`.
    pub fn with_reload(mut self, hub: ReloadHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Absolute directories to watch.
    pub fn roots(&self) -> Vec<PathBuf> {
        watch_roots(&self.rules)
            .into_iter()
            .map(|r| self.root.join(r))
            .collect()
    }

    /// Watch until the event channel closes.
    pub async fn run(self) -> Result<(), ServerError> {
        let roots = self.roots();
        let (watcher, mut rx) =
            FileWatcher::new(&roots).map_err(|e| ServerError::Watch(e.to_string()))?;

        for root in &roots {
            tracing::info!("Watching {}", root.display());
        }

        while let Some(first) = rx.recv().await {
            let batch = collect_batch(first, &mut rx, DEBOUNCE).await;
            self.handle_batch(&batch).await;
        }

        drop(watcher);
        Ok(())
    }

    /// Tasks triggered by a batch of events, each once, in rule order.
    pub fn tasks_for_batch(&self, events: &[WatchEvent]) -> Vec<TaskName> {
        let mut tasks = Vec::new();
        for event in events {
            let Some(relative) = self.relative(&event.path) else {
                continue;
            };
            for task in tasks_for(&self.rules, &relative) {
                if !tasks.contains(&task) {
                    tasks.push(task);
                }
            }
        }
        tasks
    }

    /// Run the tasks a batch triggers and refresh pages.
    ///
    /// Returns `None` when nothing was triggered.
    pub async fn handle_batch(&self, events: &[WatchEvent]) -> Option<RunSummary> {
        let tasks = self.tasks_for_batch(events);
        if tasks.is_empty() {
            return None;
        }

        let names: Vec<&str> = tasks.iter().map(TaskName::as_str).collect();
        tracing::info!("Change detected, running {}", names.join(", "));

        let summary = match self.runner.run(&tasks).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("{}", e);
                return None;
            }
        };

        if let Some(hub) = &self.hub {
            for msg in self.reload_messages(&tasks, &summary) {
                hub.send(msg);
            }
        }

        Some(summary)
    }

    /// Stylesheet-only batches refresh the written stylesheets; anything
    /// else reloads the page. Nothing is sent if every task failed.
    pub fn reload_messages(&self, tasks: &[TaskName], summary: &RunSummary) -> Vec<ReloadMessage> {
        if !summary.outcomes.iter().any(|o| o.succeeded()) {
            return Vec::new();
        }
        if !is_css_only(tasks) {
            return vec![ReloadMessage::Reload];
        }

        summary
            .written()
            .filter(|p| p.extension().is_some_and(|e| e == "css"))
            .filter_map(|p| p.strip_prefix(&self.base_dir).ok())
            .map(|p| ReloadMessage::Css {
                path: url_path(p),
            })
            .collect()
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(relative) = path.strip_prefix(&self.root) {
            return Some(relative.to_path_buf());
        }
        let canonical = path.canonicalize().ok()?;
        canonical
            .strip_prefix(&self.root)
            .ok()
            .map(Path::to_path_buf)
    }
}

/// Gather events until the channel is quiet for `window`.
async fn collect_batch(
    first: WatchEvent,
    rx: &mut mpsc::Receiver<WatchEvent>,
    window: Duration,
) -> Vec<WatchEvent> {
    let mut batch = vec![first];
    while let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        batch.push(event);
    }
    batch
}

fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
