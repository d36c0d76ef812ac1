//! Resolving requested tasks into ordered stages.

use std::collections::{HashMap, HashSet};

use crate::task::{TaskError, TaskKind, TaskName};

/// Build tasks grouped into stages. A task only depends on tasks of
/// earlier stages, so tasks inside a stage may run concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub stages: Vec<Vec<TaskName>>,
}

impl Plan {
    pub fn tasks(&self) -> impl Iterator<Item = TaskName> + '_ {
        self.stages.iter().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    pub fn contains(&self, task: TaskName) -> bool {
        self.tasks().any(|t| t == task)
    }
}

/// Resolve `names` and their transitive dependencies into a plan.
///
/// Groups expand to their dependencies. Services and composite tasks
/// contribute only their dependencies; starting them is up to the caller.
/// Every build task appears once. `clean` always runs alone, ahead of the
/// builders it would otherwise race.
pub fn plan(names: &[TaskName]) -> Result<Plan, TaskError> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    for &name in names {
        collect(name, &mut order, &mut seen);
    }

    let mut depths = HashMap::new();
    let mut visiting = HashSet::new();
    for &task in &order {
        depth(task, &build_dependencies, &mut depths, &mut visiting)?;
    }

    let clean = order.contains(&TaskName::Clean) && order.len() > 1;
    let offset = usize::from(clean);

    let mut stages: Vec<Vec<TaskName>> = Vec::new();
    if clean {
        stages.push(vec![TaskName::Clean]);
    }
    for task in order {
        if clean && task == TaskName::Clean {
            continue;
        }
        let d = depths[&task] + offset;
        if stages.len() <= d {
            stages.resize_with(d + 1, Vec::new);
        }
        stages[d].push(task);
    }

    Ok(Plan { stages })
}

/// Build tasks reachable from `name`, in declaration order.
fn collect(name: TaskName, order: &mut Vec<TaskName>, seen: &mut HashSet<TaskName>) {
    for &dep in name.dependencies() {
        collect(dep, order, seen);
    }
    if name.kind() == TaskKind::Build && seen.insert(name) {
        order.push(name);
    }
}

/// Build tasks `name` depends on, looking through groups.
fn build_dependencies(name: TaskName) -> Vec<TaskName> {
    let mut out = Vec::new();
    for &dep in name.dependencies() {
        if dep.kind() == TaskKind::Build {
            out.push(dep);
        } else {
            out.extend(build_dependencies(dep));
        }
    }
    out
}

fn depth(
    task: TaskName,
    deps: &impl Fn(TaskName) -> Vec<TaskName>,
    depths: &mut HashMap<TaskName, usize>,
    visiting: &mut HashSet<TaskName>,
) -> Result<usize, TaskError> {
    if let Some(&d) = depths.get(&task) {
        return Ok(d);
    }
    if !visiting.insert(task) {
        return Err(TaskError::Cycle(task));
    }

    let mut d = 0;
    for dep in deps(task) {
        d = d.max(depth(dep, deps, depths, visiting)? + 1);
    }

    visiting.remove(&task);
    depths.insert(task, d);
    Ok(d)
}
