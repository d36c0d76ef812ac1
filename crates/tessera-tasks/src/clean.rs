//! The `clean` task.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Project;
use crate::task::{Task, TaskError, TaskName, TaskOutput};

/// Removes the distribution and intermediate directories.
#[derive(Debug, Default)]
pub struct CleanTask;

impl Task for CleanTask {
    fn name(&self) -> TaskName {
        TaskName::Clean
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let clean = &project.paths().clean;
        let mut output = TaskOutput::default();

        for target in [&clean.dist, &clean.tmp] {
            let path = checked_target(project, target)?;
            if !path.exists() {
                continue;
            }

            let files = WalkDir::new(&path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .count();

            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(|e| TaskError::io(&path, e))?;
            } else {
                fs::remove_file(&path).map_err(|e| TaskError::io(&path, e))?;
            }

            tracing::info!("[clean] Removed {} ({} files)", path.display(), files);
            output.written.push(path);
        }

        Ok(output)
    }
}

/// Resolve a clean target, refusing the root itself and anything that
/// escapes it.
fn checked_target(project: &Project, target: &str) -> Result<PathBuf, TaskError> {
    let relative = Path::new(target.trim_start_matches("./"));
    let escapes = relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    let names_root = relative
        .components()
        .all(|c| matches!(c, Component::CurDir));

    if escapes || names_root {
        return Err(TaskError::UnsafeClean(relative.to_path_buf()));
    }
    Ok(project.resolve(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tempfile::tempdir;

    #[test]
    fn removes_outputs_and_keeps_sources() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("dist/css")).unwrap();
        fs::create_dir_all(root.join(".tmp/js")).unwrap();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::write(root.join("dist/css/main.css"), "a{}").unwrap();
        fs::write(root.join(".tmp/js/main.js"), "").unwrap();
        fs::write(root.join("app/index.html"), "<p></p>").unwrap();

        let project = Project::new(root, Settings::default());
        let output = CleanTask.run(&project).unwrap();

        assert_eq!(output.written.len(), 2);
        assert!(!root.join("dist").exists());
        assert!(!root.join(".tmp").exists());
        assert!(root.join("app/index.html").exists());
    }

    #[test]
    fn missing_directories_are_fine() {
        let temp = tempdir().unwrap();
        let project = Project::new(temp.path(), Settings::default());
        assert!(CleanTask.run(&project).unwrap().written.is_empty());
    }

    #[test]
    fn refuses_paths_outside_root() {
        let temp = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.paths.clean.dist = "../elsewhere".to_string();
        let project = Project::new(temp.path(), settings);

        assert!(matches!(
            CleanTask.run(&project),
            Err(TaskError::UnsafeClean(_))
        ));
    }

    #[test]
    fn refuses_project_root() {
        let temp = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.paths.clean.tmp = ".".to_string();
        let project = Project::new(temp.path(), settings);

        assert!(matches!(
            CleanTask.run(&project),
            Err(TaskError::UnsafeClean(_))
        ));
    }
}
