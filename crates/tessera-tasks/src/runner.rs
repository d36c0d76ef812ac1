//! Running planned tasks on the blocking pool.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::clean::CleanTask;
use crate::config::Project;
use crate::fonts::FontTask;
use crate::graph::{plan, Plan};
use crate::html::HtmlTask;
use crate::images::ImageTask;
use crate::scripts::ScriptTask;
use crate::sprites::SpriteTask;
use crate::styles::StyleTask;
use crate::task::{Bundle, Task, TaskError, TaskName, TaskOutput};

/// Task implementations keyed by name.
#[derive(Default, Clone)]
pub struct Registry {
    tasks: HashMap<TaskName, Arc<dyn Task>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every build task.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(HtmlTask));
        registry.register(Arc::new(StyleTask::new(Bundle::Main)));
        registry.register(Arc::new(StyleTask::new(Bundle::Vendor)));
        registry.register(Arc::new(ScriptTask::new(Bundle::Main)));
        registry.register(Arc::new(ScriptTask::new(Bundle::Vendor)));
        registry.register(Arc::new(ImageTask));
        registry.register(Arc::new(SpriteTask));
        registry.register(Arc::new(FontTask));
        registry.register(Arc::new(CleanTask));
        registry
    }

    /// Register a task, replacing any task with the same name.
    pub fn register(&mut self, task: Arc<dyn Task>) {
        self.tasks.insert(task.name(), task);
    }

    pub fn get(&self, name: TaskName) -> Option<Arc<dyn Task>> {
        self.tasks.get(&name).cloned()
    }
}

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: TaskName,
    pub status: TaskStatus,
    pub written: Vec<PathBuf>,
    pub duration: Duration,
}

impl TaskOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }
}

/// Outcomes of one run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
}

impl RunSummary {
    pub fn outcome(&self, task: TaskName) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task == task)
    }

    pub fn failed(&self) -> Vec<TaskName> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.task)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::succeeded)
    }

    /// Every file written during the run.
    pub fn written(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().flat_map(|o| o.written.iter())
    }
}

/// Runs tasks against one project.
///
/// Tasks of a stage run concurrently on tokio's blocking pool. A failing
/// task is logged and does not stop the others.
#[derive(Clone)]
pub struct TaskRunner {
    project: Arc<Project>,
    registry: Arc<Registry>,
}

impl TaskRunner {
    pub fn new(project: Project) -> Self {
        Self::with_registry(project, Registry::standard())
    }

    pub fn with_registry(project: Project, registry: Registry) -> Self {
        Self {
            project: Arc::new(project),
            registry: Arc::new(registry),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Plan `names` and run every resulting build task.
    pub async fn run(&self, names: &[TaskName]) -> Result<RunSummary, TaskError> {
        let plan = plan(names)?;
        Ok(self.run_plan(&plan).await)
    }

    pub async fn run_plan(&self, plan: &Plan) -> RunSummary {
        let mut summary = RunSummary::default();

        for stage in &plan.stages {
            let mut set = JoinSet::new();

            for &name in stage {
                let Some(task) = self.registry.get(name) else {
                    let outcome = failed(name, TaskError::NotBuildable(name), Duration::ZERO);
                    summary.outcomes.push(outcome);
                    continue;
                };

                let project = Arc::clone(&self.project);
                tracing::info!("Starting '{}'...", name);
                set.spawn_blocking(move || {
                    let start = Instant::now();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| task.run(&project)))
                        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload))));
                    (name, result, start.elapsed())
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, result, elapsed)) => summary.outcomes.push(complete(name, result, elapsed)),
                    Err(e) => tracing::error!("Task was cancelled: {}", e),
                }
            }
        }

        summary
    }
}

/// Shared handler for finished tasks: log and record, never abort.
fn complete(name: TaskName, result: Result<TaskOutput, TaskError>, elapsed: Duration) -> TaskOutcome {
    match result {
        Ok(output) => {
            tracing::info!("Finished '{}' after {}", name, format_duration(elapsed));
            TaskOutcome {
                task: name,
                status: TaskStatus::Succeeded,
                written: output.written,
                duration: elapsed,
            }
        }
        Err(e) => failed(name, e, elapsed),
    }
}

fn failed(name: TaskName, error: TaskError, elapsed: Duration) -> TaskOutcome {
    tracing::error!("'{}' errored after {}: {}", name, format_duration(elapsed), error);
    TaskOutcome {
        task: name,
        status: TaskStatus::Failed(error.to_string()),
        written: Vec::new(),
        duration: elapsed,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn format_duration(d: Duration) -> String {
    if d.as_secs() >= 1 {
        format!("{:.2} s", d.as_secs_f64())
    } else {
        format!("{} ms", d.as_millis())
    }
}
