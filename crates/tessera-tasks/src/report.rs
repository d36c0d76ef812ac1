//! Output size reporting.

/// Running total of files and bytes written by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeReport {
    pub title: String,
    pub files: usize,
    pub bytes: u64,
}

impl SizeReport {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            files: 0,
            bytes: 0,
        }
    }

    pub fn add(&mut self, bytes: usize) {
        self.files += 1;
        self.bytes += bytes as u64;
    }

    pub fn log(&self) {
        tracing::info!("{}", self);
    }
}

impl std::fmt::Display for SizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = if self.files == 1 { "file" } else { "files" };
        write!(
            f,
            "{} {} {}, {}",
            self.title,
            self.files,
            noun,
            human_size(self.bytes)
        )
    }
}

/// Format a byte count with decimal units (`1.2 kB`).
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1000.0;
    let mut unit = 0;
    while value >= 1000.0 && unit + 1 < UNITS.len() {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(999), "999 B");
        assert_eq!(human_size(1500), "1.5 kB");
        assert_eq!(human_size(2_000_000), "2.0 MB");
    }

    #[test]
    fn counts_files() {
        let mut report = SizeReport::new("CSS:main_size");
        report.add(1200);
        report.add(300);

        assert_eq!(report.files, 2);
        assert_eq!(report.to_string(), "CSS:main_size 2 files, 1.5 kB");
    }
}
