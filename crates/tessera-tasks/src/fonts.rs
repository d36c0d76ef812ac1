//! The `fonts` task.

use crate::config::Project;
use crate::globs::GlobSet;
use crate::output::{destination, read_file, write_file};
use crate::task::{finish, report_file_error, Task, TaskError, TaskName, TaskOutput};

/// Copies font files to the distribution directory unchanged.
#[derive(Debug, Default)]
pub struct FontTask;

impl Task for FontTask {
    fn name(&self) -> TaskName {
        TaskName::Fonts
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let paths = project.paths();
        let sources = GlobSet::single(&paths.app.fonts)?;
        let files = sources.expand(&project.root)?;
        let base = project.root.join(sources.base());
        let dist_dir = project.resolve(&paths.dist.fonts);

        let mut output = TaskOutput::with_report("Fonts_size");
        let mut failed = 0;

        for file in &files {
            let dest = destination(file, &base, &dist_dir);
            let copied = read_file(file).and_then(|bytes| {
                write_file(&dest, &bytes)?;
                Ok(bytes.len())
            });
            match copied {
                Ok(size) => output.record(dest, size),
                Err(e) => {
                    report_file_error(self.name(), &e);
                    failed += 1;
                }
            }
        }

        finish(output, failed, files.len())
    }
}
