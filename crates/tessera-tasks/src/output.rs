//! Writing task output.

use std::fs;
use std::path::{Path, PathBuf};

use crate::task::TaskError;

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| TaskError::io(path, e))
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, TaskError> {
    fs::read(path).map_err(|e| TaskError::io(path, e))
}

pub fn read_text(path: &Path) -> Result<String, TaskError> {
    fs::read_to_string(path).map_err(|e| TaskError::io(path, e))
}

/// Destination for `source` under `dest`, keeping its path relative to the
/// glob base (`app/img/icons/a.png` with base `app/img` -> `dest/icons/a.png`).
pub fn destination(source: &Path, base: &Path, dest: &Path) -> PathBuf {
    match source.strip_prefix(base) {
        Ok(relative) => dest.join(relative),
        Err(_) => dest.join(source.file_name().unwrap_or(source.as_os_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keeps_path_below_base() {
        let dest = destination(
            Path::new("/p/app/img/icons/a.png"),
            Path::new("/p/app/img"),
            Path::new("/p/dist/img"),
        );
        assert_eq!(dest, PathBuf::from("/p/dist/img/icons/a.png"));
    }

    #[test]
    fn falls_back_to_file_name() {
        let dest = destination(
            Path::new("/elsewhere/a.png"),
            Path::new("/p/app/img"),
            Path::new("/p/dist/img"),
        );
        assert_eq!(dest, PathBuf::from("/p/dist/img/a.png"));
    }

    #[test]
    fn creates_parent_directories() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a/b/c.txt");
        write_file(&path, "x").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x");
    }
}
