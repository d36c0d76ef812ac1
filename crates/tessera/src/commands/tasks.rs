//! Task listing.

use tessera_tasks::{TaskKind, TaskName};

/// Print every task with its kind and dependencies.
pub fn run() {
    for line in describe() {
        println!("{}", line);
    }
}

fn describe() -> Vec<String> {
    TaskName::ALL
        .iter()
        .map(|task| {
            let kind = match task.kind() {
                TaskKind::Build => "build",
                TaskKind::Group => "group",
                TaskKind::Service => "service",
                TaskKind::Composite => "composite",
            };
            let mut line = format!("{:<12} {:<10}", task.as_str(), kind);
            if !task.dependencies().is_empty() {
                line.push_str(&format!(" deps: {}", join(task.dependencies())));
            }
            if !task.starts().is_empty() {
                line.push_str(&format!(" then: {}", join(task.starts())));
            }
            line.trim_end().to_string()
        })
        .collect()
}

fn join(tasks: &[TaskName]) -> String {
    tasks
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_task() {
        let lines = describe();
        assert_eq!(lines.len(), TaskName::ALL.len());
        assert!(lines
            .iter()
            .any(|l| l.starts_with("webserver") && l.ends_with("deps: sprites, img")));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("default") && l.contains("then: dist, webserver, watch")));
    }
}
