//! Scaffold a new project.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tessera_tasks::sprites::DEFAULT_TEMPLATE;

/// Run the init command. Existing files are kept unless `yes` is set.
pub async fn run(config: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing tessera...");

    let root = match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if root.join("app").exists() && !yes {
        tracing::warn!("app/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    let file_name = config
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tessera.toml");

    let files: [(&str, &str); 8] = [
        (file_name, DEFAULT_CONFIG),
        ("app/index.html", DEFAULT_INDEX),
        ("app/partials/header.html", DEFAULT_HEADER),
        ("app/scss/main.scss", DEFAULT_MAIN_SCSS),
        ("app/scss/vendor.scss", DEFAULT_VENDOR_SCSS),
        ("app/js/main.js", DEFAULT_MAIN_JS),
        ("app/js/vendor.js", DEFAULT_VENDOR_JS),
        ("app/sass.template.jinja", DEFAULT_TEMPLATE),
    ];

    for (relative, contents) in files {
        let path = root.join(relative);
        if path.exists() && !yes {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
    }

    for dir in ["app/img", "app/sprites", "app/fonts", "app/scss/components/_components"] {
        fs::create_dir_all(root.join(dir)).with_context(|| format!("Failed to create {}", dir))?;
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'tessera' to build, serve and watch.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# tessera configuration
#
# Every key is optional; the values below are the defaults.

[paths.dist]
html = "dist/"
css = "dist/css/"
js = "dist/js/"
img = "dist/img/"
# URL of the sprite sheet as seen from the compiled stylesheets
sprites = "../img/sprites.png"
fonts = "dist/fonts"

[paths.tmp]
html = ".tmp/"
css = ".tmp/css"
js = ".tmp/js"

[paths.app]
html = "app/*.html"
img = "app/img/**/*.*"
sprites = "app/sprites/**/*.*"
css_template = "app/sass.template.jinja"
fonts = "app/fonts/**/*.*"

[paths.app.scss]
vendor = "app/scss/vendor.scss"
main = "app/scss/main.scss"
sprites = "app/scss/components/_components/"

[paths.app.js]
vendor = "app/js/vendor.js"
main = "app/js/main.js"

[paths.clean]
dist = "dist"
tmp = ".tmp"

[server]
base_dir = "./dist"
host = "localhost"
port = 7777
log_prefix = "GRS*_^"
# Public tunnel name (not supported); set to "" to disable
tunnel = "grsonline"
online = false
notify = false
open = false

[css]
browsers = ["last 5 versions"]

[sprites]
image_name = "sprites.png"
css_name = "_sprites.scss"
padding = 20
prefix = "s-"
"#;

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>tessera</title>
    <link rel="stylesheet" href="css/vendor.css">
    <link rel="stylesheet" href="css/main.css">
  </head>
  <body>
    //= partials/header.html
    <main class="page-content">
      <p>Edit app/index.html and save to reload.</p>
    </main>
    <script src="js/vendor.js"></script>
    <script src="js/main.js"></script>
  </body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header class="site-header">
  <h1>tessera</h1>
</header>
"#;

const DEFAULT_MAIN_SCSS: &str = r#"$text-color: #222;

body {
  color: $text-color;
  font-family: sans-serif;
}

.site-header {
  display: flex;
  align-items: center;
}
"#;

const DEFAULT_VENDOR_SCSS: &str = r#"html {
  box-sizing: border-box;
}

*,
*::before,
*::after {
  box-sizing: inherit;
}
"#;

const DEFAULT_MAIN_JS: &str = r#"function ready(callback) {
  if (document.readyState !== 'loading') {
    callback();
  } else {
    document.addEventListener('DOMContentLoaded', callback);
  }
}

ready(function () {
  document.documentElement.className = 'js';
});
"#;

const DEFAULT_VENDOR_JS: &str = "/* Third-party scripts go here. */\n";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tessera_tasks::Settings;

    #[test]
    fn default_config_parses() {
        let settings = Settings::parse(DEFAULT_CONFIG).unwrap();
        let defaults = Settings::default();

        assert_eq!(settings.paths, defaults.paths);
        assert_eq!(settings.sprites, defaults.sprites);
        assert_eq!(settings.server.port, 7777);
        assert_eq!(settings.server.tunnel, defaults.server.tunnel);
    }

    #[tokio::test]
    async fn scaffolds_next_to_config() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("tessera.toml");

        run(&config, false).await.unwrap();

        assert!(config.is_file());
        assert!(temp.path().join("app/index.html").is_file());
        assert!(temp.path().join("app/js/vendor.js").is_file());
        assert!(temp.path().join("app/sprites").is_dir());
        assert!(temp.path().join("app/sass.template.jinja").is_file());
    }

    #[tokio::test]
    async fn keeps_existing_project_without_yes() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("tessera.toml");
        let index = temp.path().join("app/index.html");
        fs::create_dir_all(index.parent().unwrap()).unwrap();
        fs::write(&index, "mine").unwrap();

        run(&config, false).await.unwrap();

        assert_eq!(fs::read_to_string(&index).unwrap(), "mine");
        assert!(!config.exists());
    }
}
