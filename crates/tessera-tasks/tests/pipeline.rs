use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgba, RgbaImage};
use tempfile::{tempdir, TempDir};
use tessera_tasks::{Project, Settings, TaskName, TaskRunner};

fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ColorType::Rgba8)
        .unwrap();
    out.into_inner()
}

fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn scaffold() -> TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();

    write(
        root,
        "app/index.html",
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Demo</title>\n  </head>\n  <body>\n    //= partials/header.html\n  </body>\n</html>\n",
    );
    write(root, "app/partials/header.html", "<header class=\"site-header\">Hi</header>\n");
    write(
        root,
        "app/scss/main.scss",
        "$accent: #c00;\n.button {\n  color: $accent;\n  .icon { display: flex; }\n}\n",
    );
    write(root, "app/scss/vendor.scss", "html { margin: 0; }\n");
    write(
        root,
        "app/js/main.js",
        "//= modules/menu.js\nfunction start(targetName) {\n  return menu(targetName);\n}\nstart('nav');\n",
    );
    write(
        root,
        "app/js/modules/menu.js",
        "function menu(label) {\n  return label.toUpperCase();\n}\n",
    );
    write(root, "app/js/vendor.js", "var vendorVersion = '1.0.0';\n");
    write(root, "app/img/logo.png", png(16, 16, [10, 20, 30, 255]));
    write(root, "app/sprites/arrow.png", png(8, 8, [255, 0, 0, 255]));
    write(root, "app/sprites/close.png", png(12, 6, [0, 255, 0, 255]));
    write(root, "app/fonts/body.woff2", b"wOF2-font-bytes");

    temp
}

fn runner(temp: &TempDir) -> TaskRunner {
    TaskRunner::new(Project::new(temp.path(), Settings::default()))
}

#[tokio::test]
async fn dist_writes_only_into_output_directories() {
    let temp = scaffold();
    let root = temp.path();

    let summary = runner(&temp).run(&[TaskName::Dist]).await.unwrap();
    assert!(summary.is_success(), "failed: {:?}", summary.failed());

    let sprite_partial = root.join("app/scss/components/_components/_sprites.scss");
    for path in summary.written() {
        assert!(
            path.starts_with(root.join("dist"))
                || path.starts_with(root.join(".tmp"))
                || *path == sprite_partial,
            "unexpected output {}",
            path.display()
        );
    }

    for expected in [
        "dist/index.html",
        "dist/css/main.css",
        "dist/css/vendor.css",
        "dist/js/main.js",
        "dist/js/vendor.js",
        "dist/img/logo.png",
        "dist/img/sprites.png",
        "dist/fonts/body.woff2",
        ".tmp/index.html",
        ".tmp/css/main.css",
        ".tmp/js/main.js",
    ] {
        assert!(root.join(expected).is_file(), "missing {}", expected);
    }

    let html = fs::read_to_string(root.join("dist/index.html")).unwrap();
    assert!(html.contains("site-header"));
    assert!(!html.contains("//="));

    let css = fs::read_to_string(root.join("dist/css/main.css")).unwrap();
    assert!(css.contains(".button .icon"));
    assert!(css.contains("sourceMappingURL=data:application/json;charset=utf-8;base64,"));

    let js = fs::read_to_string(root.join(".tmp/js/main.js")).unwrap();
    assert!(js.contains("function menu(label)"));
}

#[tokio::test]
async fn sprites_write_sheet_and_partial() {
    let temp = scaffold();
    let root = temp.path();

    let summary = runner(&temp).run(&[TaskName::Sprites]).await.unwrap();
    assert!(summary.is_success());

    let sheet = image::open(root.join("dist/img/sprites.png")).unwrap();
    assert!(sheet.width() >= 12);

    let partial =
        fs::read_to_string(root.join("app/scss/components/_components/_sprites.scss")).unwrap();
    assert!(partial.contains("$s-arrow:"));
    assert!(partial.contains("$s-close:"));
    assert!(partial.contains("../img/sprites.png"));
}

#[tokio::test]
async fn img_is_idempotent() {
    let temp = scaffold();
    let root = temp.path();
    let runner = runner(&temp);

    runner.run(&[TaskName::Img]).await.unwrap();
    let first = fs::read(root.join("dist/img/logo.png")).unwrap();
    runner.run(&[TaskName::Img]).await.unwrap();
    let second = fs::read(root.join("dist/img/logo.png")).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn broken_stylesheet_does_not_stop_other_tasks() {
    let temp = scaffold();
    let root = temp.path();
    write(root, "app/scss/main.scss", ".button { color: $undefined; }\n");

    let summary = runner(&temp).run(&[TaskName::Dist]).await.unwrap();

    assert_eq!(summary.failed(), vec![TaskName::CssMain]);
    assert!(root.join("dist/css/vendor.css").is_file());
    assert!(root.join("dist/js/main.js").is_file());
    assert!(!root.join("dist/css/main.css").exists());
}

#[tokio::test]
async fn clean_removes_outputs_and_keeps_sources() {
    let temp = scaffold();
    let root = temp.path();
    let runner = runner(&temp);

    runner.run(&[TaskName::Dist]).await.unwrap();
    assert!(root.join("dist").exists());

    let summary = runner.run(&[TaskName::Clean]).await.unwrap();
    assert!(summary.is_success());
    assert!(!root.join("dist").exists());
    assert!(!root.join(".tmp").exists());
    assert!(root.join("app/index.html").is_file());
    assert!(root.join("app/js/vendor.js").is_file());
}
