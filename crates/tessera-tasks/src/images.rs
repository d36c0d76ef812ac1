//! The `img` task and the image optimizer shared with `sprites`.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder, ImageFormat};
use rayon::prelude::*;
use regex::Regex;

use crate::config::Project;
use crate::globs::GlobSet;
use crate::output::{destination, read_file, write_file};
use crate::task::{finish, report_file_error, Task, TaskError, TaskName, TaskOutput};

static SVG_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));
// Only line-break indentation; a same-line space between tags can be text.
static SVG_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*\n\s*<").expect("gap pattern is valid"));

/// Optimizes every image under `paths.app.img`.
#[derive(Debug, Default)]
pub struct ImageTask;

impl Task for ImageTask {
    fn name(&self) -> TaskName {
        TaskName::Img
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let paths = project.paths();
        let sources = GlobSet::single(&paths.app.img)?;
        let files = sources.expand(&project.root)?;
        let base = project.root.join(sources.base());
        let dist_dir = project.resolve(&paths.dist.img);

        let optimized: Vec<(PathBuf, Result<Vec<u8>, TaskError>)> = files
            .par_iter()
            .map(|file| {
                let result = read_file(file).and_then(|bytes| optimize(file, bytes));
                (destination(file, &base, &dist_dir), result)
            })
            .collect();

        let mut output = TaskOutput::with_report("IMG_size");
        let mut failed = 0;

        for (dest, result) in optimized {
            match result {
                Ok(bytes) => {
                    write_file(&dest, &bytes)?;
                    output.record(dest, bytes.len());
                }
                Err(e) => {
                    report_file_error(self.name(), &e);
                    failed += 1;
                }
            }
        }

        finish(output, failed, files.len())
    }
}

/// Optimize an image by file type. Unknown types pass through unchanged.
pub fn optimize(path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, TaskError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" => optimize_png(path, bytes),
        "svg" => match String::from_utf8(bytes) {
            Ok(text) => Ok(minify_svg(&text).into_bytes()),
            Err(e) => Ok(e.into_bytes()),
        },
        _ => Ok(bytes),
    }
}

/// Losslessly re-encode a PNG; keep the original when that is smaller.
fn optimize_png(path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, TaskError> {
    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png).map_err(|e| {
        TaskError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let encoded = encode_png(&image).map_err(|e| TaskError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if encoded.len() < bytes.len() {
        Ok(encoded)
    } else {
        Ok(bytes)
    }
}

/// Encode with maximum compression and adaptive filtering.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
        .write_image(image.as_bytes(), image.width(), image.height(), image.color())?;
    Ok(out.into_inner())
}

/// Drop comments and whitespace between tags. Attributes, including
/// `viewBox`, are untouched.
pub fn minify_svg(svg: &str) -> String {
    let without_comments = SVG_COMMENT.replace_all(svg, "");
    SVG_GAP
        .replace_all(&without_comments, "><")
        .trim()
        .to_string()
}
