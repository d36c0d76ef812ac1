//! The `sprites` task: packs images into one sheet and renders a stylesheet
//! partial describing where each sprite sits.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use minijinja::{context, Environment};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Project;
use crate::globs::GlobSet;
use crate::images::encode_png;
use crate::output::{read_text, write_file};
use crate::task::{finish, report_file_error, Task, TaskError, TaskName, TaskOutput};

/// Used when the project has no template of its own.
pub const DEFAULT_TEMPLATE: &str = r#"// Generated by tessera. Do not edit.
{% for s in sprites -%}
${{ s.name }}: ({{ s.px.x }}, {{ s.px.y }}, {{ s.px.offset_x }}, {{ s.px.offset_y }}, {{ s.px.width }}, {{ s.px.height }}, {{ s.px.total_width }}, {{ s.px.total_height }}, '{{ s.escaped_image }}', '{{ s.name }}');
{% endfor %}
$spritesheet-sprites: ({% for s in sprites %}${{ s.name }}{% if not loop.last %}, {% endif %}{% endfor %});
$spritesheet: ({{ spritesheet.px.width }}, {{ spritesheet.px.height }}, '{{ spritesheet.escaped_image }}', $spritesheet-sprites);

@mixin sprite-width($sprite) {
  width: nth($sprite, 5);
}

@mixin sprite-height($sprite) {
  height: nth($sprite, 6);
}

@mixin sprite-position($sprite) {
  background-position: nth($sprite, 3) nth($sprite, 4);
}

@mixin sprite-image($sprite) {
  background-image: url(nth($sprite, 9));
}

@mixin sprite($sprite) {
  @include sprite-image($sprite);
  @include sprite-position($sprite);
  @include sprite-width($sprite);
  @include sprite-height($sprite);
}
"#;

/// Builds the sprite sheet and its stylesheet partial.
#[derive(Debug, Default)]
pub struct SpriteTask;

impl Task for SpriteTask {
    fn name(&self) -> TaskName {
        TaskName::Sprites
    }

    fn run(&self, project: &Project) -> Result<TaskOutput, TaskError> {
        let paths = project.paths();
        let settings = &project.settings.sprites;
        let files = GlobSet::single(&paths.app.sprites)?.expand(&project.root)?;

        let mut output = TaskOutput::with_report("Sprites_Size");
        if files.is_empty() {
            tracing::info!("[sprites] No sprites match {}", paths.app.sprites);
            return Ok(output);
        }

        let decoded: Vec<(PathBuf, Result<RgbaImage, TaskError>)> = files
            .par_iter()
            .map(|file| (file.clone(), decode(file)))
            .collect();

        let mut sprites = Vec::new();
        let mut failed = 0;
        for (file, result) in decoded {
            match result {
                Ok(image) => {
                    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("sprite");
                    sprites.push((format!("{}{}", settings.prefix, stem), image));
                }
                Err(e) => {
                    report_file_error(self.name(), &e);
                    failed += 1;
                }
            }
        }

        if sprites.is_empty() {
            return finish(output, failed, files.len());
        }

        let sizes: Vec<(u32, u32)> = sprites.iter().map(|(_, i)| i.dimensions()).collect();
        let layout = pack(&sizes, settings.padding);

        let mut sheet = RgbaImage::new(layout.width, layout.height);
        for ((_, image), &(x, y)) in sprites.iter().zip(&layout.positions) {
            image::imageops::replace(&mut sheet, image, i64::from(x), i64::from(y));
        }

        let image_path = project.resolve(&paths.dist.img).join(&settings.image_name);
        let png = encode_png(&DynamicImage::ImageRgba8(sheet)).map_err(|e| TaskError::Image {
            path: image_path.clone(),
            message: e.to_string(),
        })?;
        write_file(&image_path, &png)?;
        output.record(image_path, png.len());

        let entries: Vec<SpriteEntry> = sprites
            .iter()
            .zip(&layout.positions)
            .zip(&sizes)
            .map(|(((name, _), &(x, y)), &(w, h))| {
                SpriteEntry::new(name, (x, y), (w, h), &layout, &paths.dist.sprites)
            })
            .collect();

        let template_path = project.resolve(&paths.app.css_template);
        let template = if template_path.is_file() {
            read_text(&template_path)?
        } else {
            DEFAULT_TEMPLATE.to_string()
        };
        let stylesheet = render_stylesheet(&template, &entries, &layout, &paths.dist.sprites)?;

        let css_path = project.resolve(&paths.app.scss.sprites).join(&settings.css_name);
        write_file(&css_path, &stylesheet)?;
        output.record_intermediate(css_path);

        finish(output, failed, files.len())
    }
}

fn decode(path: &Path) -> Result<RgbaImage, TaskError> {
    image::open(path)
        .map(|image| image.to_rgba8())
        .map_err(|e| TaskError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Template data for one sprite.
#[derive(Debug, Clone, Serialize)]
pub struct SpriteEntry {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub offset_x: i64,
    pub offset_y: i64,
    pub width: u32,
    pub height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub image: String,
    pub escaped_image: String,
    pub px: PixelValues,
}

/// The numeric fields of [`SpriteEntry`] as CSS pixel strings.
#[derive(Debug, Clone, Serialize)]
pub struct PixelValues {
    pub x: String,
    pub y: String,
    pub offset_x: String,
    pub offset_y: String,
    pub width: String,
    pub height: String,
    pub total_width: String,
    pub total_height: String,
}

fn px(value: impl std::fmt::Display) -> String {
    format!("{}px", value)
}

fn escape_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace('\'', "\\'")
}

impl SpriteEntry {
    fn new(name: &str, pos: (u32, u32), size: (u32, u32), layout: &Layout, image: &str) -> Self {
        let offset_x = -i64::from(pos.0);
        let offset_y = -i64::from(pos.1);
        Self {
            name: name.to_string(),
            x: pos.0,
            y: pos.1,
            offset_x,
            offset_y,
            width: size.0,
            height: size.1,
            total_width: layout.width,
            total_height: layout.height,
            image: image.to_string(),
            escaped_image: escape_url(image),
            px: PixelValues {
                x: px(pos.0),
                y: px(pos.1),
                offset_x: px(offset_x),
                offset_y: px(offset_y),
                width: px(size.0),
                height: px(size.1),
                total_width: px(layout.width),
                total_height: px(layout.height),
            },
        }
    }
}

/// Render the stylesheet partial with minijinja.
pub fn render_stylesheet(
    template: &str,
    sprites: &[SpriteEntry],
    layout: &Layout,
    image: &str,
) -> Result<String, TaskError> {
    let env = Environment::new();
    env.render_str(
        template,
        context! {
            sprites => sprites,
            spritesheet => context! {
                width => layout.width,
                height => layout.height,
                image => image,
                escaped_image => escape_url(image),
                px => context! {
                    width => px(layout.width),
                    height => px(layout.height),
                },
            },
        },
    )
    .map_err(|e| TaskError::Template(e.to_string()))
}

/// Packed positions, in input order, and the sheet size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub positions: Vec<(u32, u32)>,
    pub width: u32,
    pub height: u32,
}

/// Binary-tree packing that grows the sheet right or down as needed,
/// keeping it roughly square. Larger images are placed first.
///
/// Every image is padded by `padding` on its right and bottom; trailing
/// padding is trimmed from the sheet.
pub fn pack(sizes: &[(u32, u32)], padding: u32) -> Layout {
    let padded: Vec<(u32, u32)> = sizes
        .iter()
        .map(|&(w, h)| (w + padding, h + padding))
        .collect();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(padded[i].0.max(padded[i].1)));

    let mut positions = vec![(0, 0); sizes.len()];
    let Some(&first) = order.first() else {
        return Layout {
            positions,
            width: 0,
            height: 0,
        };
    };

    let mut packer = Packer::new(padded[first].0, padded[first].1);
    for &i in &order {
        let (w, h) = padded[i];
        positions[i] = packer.place(w, h);
    }

    let width = positions
        .iter()
        .zip(&padded)
        .map(|(&(x, _), &(w, _))| x + w)
        .max()
        .unwrap_or(0);
    let height = positions
        .iter()
        .zip(&padded)
        .map(|(&(_, y), &(_, h))| y + h)
        .max()
        .unwrap_or(0);

    Layout {
        positions,
        width: width.saturating_sub(padding),
        height: height.saturating_sub(padding),
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Node {
    fn free(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Growing bin packer over an arena of nodes.
struct Packer {
    nodes: Vec<Node>,
    root: usize,
}

impl Packer {
    fn new(w: u32, h: u32) -> Self {
        Self {
            nodes: vec![Node::free(0, 0, w, h)],
            root: 0,
        }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn place(&mut self, w: u32, h: u32) -> (u32, u32) {
        match self.find(self.root, w, h) {
            Some(i) => self.split(i, w, h),
            None => self.grow(w, h),
        }
    }

    fn find(&self, idx: usize, w: u32, h: u32) -> Option<usize> {
        let node = &self.nodes[idx];
        if node.used {
            node.right
                .and_then(|r| self.find(r, w, h))
                .or_else(|| node.down.and_then(|d| self.find(d, w, h)))
        } else if w <= node.w && h <= node.h {
            Some(idx)
        } else {
            None
        }
    }

    fn split(&mut self, idx: usize, w: u32, h: u32) -> (u32, u32) {
        let Node { x, y, w: nw, h: nh, .. } = self.nodes[idx];
        let down = self.push(Node::free(x, y + h, nw, nh - h));
        let right = self.push(Node::free(x + w, y, nw - w, h));
        let node = &mut self.nodes[idx];
        node.used = true;
        node.down = Some(down);
        node.right = Some(right);
        (x, y)
    }

    fn grow(&mut self, w: u32, h: u32) -> (u32, u32) {
        let root = self.nodes[self.root];
        let can_grow_down = w <= root.w;
        let can_grow_right = h <= root.h;
        let should_grow_right = can_grow_right && root.h >= root.w + w;
        let should_grow_down = can_grow_down && root.w >= root.h + h;

        if should_grow_right || (can_grow_right && !should_grow_down) {
            self.grow_right(w, h)
        } else {
            // Only reachable without `can_grow_down` when blocks arrive out
            // of order; grow_down widens the sheet in that case.
            self.grow_down(w, h)
        }
    }

    fn grow_right(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old = self.nodes[self.root];
        let right = self.push(Node::free(old.w, 0, w, old.h));
        let new_root = self.push(Node {
            x: 0,
            y: 0,
            w: old.w + w,
            h: old.h,
            used: true,
            right: Some(right),
            down: Some(self.root),
        });
        self.root = new_root;
        self.place(w, h)
    }

    fn grow_down(&mut self, w: u32, h: u32) -> (u32, u32) {
        let old = self.nodes[self.root];
        let width = old.w.max(w);
        let down = self.push(Node::free(0, old.h, width, h));
        let new_root = self.push(Node {
            x: 0,
            y: 0,
            w: width,
            h: old.h + h,
            used: true,
            down: Some(down),
            right: Some(self.root),
        });
        self.root = new_root;
        self.place(w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
    }

    #[test]
    fn single_sprite_fills_sheet() {
        let layout = pack(&[(16, 24)], 20);
        assert_eq!(layout.positions, vec![(0, 0)]);
        assert_eq!((layout.width, layout.height), (16, 24));
    }

    #[test]
    fn empty_input_packs_nothing() {
        let layout = pack(&[], 20);
        assert!(layout.positions.is_empty());
        assert_eq!((layout.width, layout.height), (0, 0));
    }

    #[test]
    fn padded_boxes_never_overlap() {
        let sizes = [(10, 10), (20, 5), (5, 20), (8, 8), (30, 12), (1, 1)];
        let padding = 2;
        let layout = pack(&sizes, padding);

        let boxes: Vec<(u32, u32, u32, u32)> = layout
            .positions
            .iter()
            .zip(&sizes)
            .map(|(&(x, y), &(w, h))| (x, y, w + padding, h + padding))
            .collect();

        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                assert!(!overlaps(boxes[i], boxes[j]), "{:?} overlaps {:?}", boxes[i], boxes[j]);
            }
            let (x, y, w, h) = boxes[i];
            assert!(x + w - padding <= layout.width);
            assert!(y + h - padding <= layout.height);
        }
    }

    #[test]
    fn layout_is_deterministic() {
        let sizes = [(12, 7), (7, 12), (9, 9)];
        assert_eq!(pack(&sizes, 20), pack(&sizes, 20));
    }

    #[test]
    fn default_template_prefixes_every_variable() {
        let layout = pack(&[(10, 10)], 0);
        let entry = SpriteEntry::new("s-home", (0, 0), (10, 10), &layout, "../img/sprites.png");
        let out = render_stylesheet(DEFAULT_TEMPLATE, &[entry], &layout, "../img/sprites.png")
            .unwrap();

        assert!(out.contains("$s-home: (0px, 0px, 0px, 0px, 10px, 10px, 10px, 10px, '../img/sprites.png', 's-home');"));
        assert!(out.contains("$spritesheet-sprites: ($s-home);"));
    }
}
