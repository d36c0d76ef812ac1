//! Path table and tool settings.
//!
//! Everything has a literal default; `tessera.toml` overrides individual keys.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Top-level settings, one section per concern.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub paths: PathTable,
    pub server: ServerSettings,
    pub html: HtmlSettings,
    pub css: CssSettings,
    pub sprites: SpriteSettings,
}

impl Settings {
    /// Load settings from `path` if the file exists, otherwise return defaults.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings = Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Source, intermediate and distribution paths per asset category.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathTable {
    pub dist: DistPaths,
    pub tmp: TmpPaths,
    pub app: AppPaths,
    pub watch: WatchPaths,
    pub clean: CleanPaths,
}

/// Final distribution directories.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistPaths {
    pub html: String,
    pub css: String,
    pub js: String,
    pub img: String,
    /// URL of the sprite sheet as referenced from the compiled stylesheets.
    pub sprites: String,
    pub fonts: String,
}

impl Default for DistPaths {
    fn default() -> Self {
        Self {
            html: "dist/".to_string(),
            css: "dist/css/".to_string(),
            js: "dist/js/".to_string(),
            img: "dist/img/".to_string(),
            sprites: "../img/sprites.png".to_string(),
            fonts: "dist/fonts".to_string(),
        }
    }
}

/// Unminified debug mirror.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TmpPaths {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Default for TmpPaths {
    fn default() -> Self {
        Self {
            html: ".tmp/".to_string(),
            css: ".tmp/css".to_string(),
            js: ".tmp/js".to_string(),
        }
    }
}

/// Source globs and entry points.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppPaths {
    pub html: String,
    pub scss: ScssSources,
    pub js: ScriptSources,
    pub img: String,
    pub sprites: String,
    pub css_template: String,
    pub fonts: String,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self {
            html: "app/*.html".to_string(),
            scss: ScssSources::default(),
            js: ScriptSources::default(),
            img: "app/img/**/*.*".to_string(),
            sprites: "app/sprites/**/*.*".to_string(),
            css_template: "app/sass.template.jinja".to_string(),
            fonts: "app/fonts/**/*.*".to_string(),
        }
    }
}

/// Stylesheet entry points plus the directory receiving the sprite partial.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScssSources {
    pub vendor: String,
    pub main: String,
    pub sprites: String,
}

impl Default for ScssSources {
    fn default() -> Self {
        Self {
            vendor: "app/scss/vendor.scss".to_string(),
            main: "app/scss/main.scss".to_string(),
            sprites: "app/scss/components/_components/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScriptSources {
    pub vendor: String,
    pub main: String,
}

impl Default for ScriptSources {
    fn default() -> Self {
        Self {
            vendor: "app/js/vendor.js".to_string(),
            main: "app/js/main.js".to_string(),
        }
    }
}

/// Globs observed by the watch session.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchPaths {
    pub html: String,
    pub scss: VendorMainGlobs,
    pub js: VendorMainGlobs,
    pub img: String,
    pub sprites: String,
    pub fonts: String,
}

impl Default for WatchPaths {
    fn default() -> Self {
        Self {
            html: "app/**/*.html".to_string(),
            scss: VendorMainGlobs {
                vendor: "app/scss/vendor.scss".to_string(),
                main: "app/scss/**/*.scss".to_string(),
            },
            js: VendorMainGlobs {
                vendor: "app/js/vendor.js".to_string(),
                main: "app/js/**/*.js".to_string(),
            },
            img: "app/img/**/*.*".to_string(),
            sprites: "app/sprites/**/*.*".to_string(),
            fonts: "app/fonts/**/*.*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct VendorMainGlobs {
    pub vendor: String,
    pub main: String,
}

/// Directories removed by the clean task.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleanPaths {
    pub dist: String,
    pub tmp: String,
}

impl Default for CleanPaths {
    fn default() -> Self {
        Self {
            dist: "dist".to_string(),
            tmp: ".tmp".to_string(),
        }
    }
}

/// Development server settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub base_dir: String,
    pub host: String,
    pub port: u16,
    pub log_prefix: String,
    /// Public tunnel name. Accepted but not supported. An empty string
    /// disables it.
    #[serde(deserialize_with = "non_empty")]
    pub tunnel: Option<String>,
    pub online: bool,
    /// Show an in-page notice when the page is refreshed.
    pub notify: bool,
    /// Open the browser once the server is listening.
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_dir: "./dist".to_string(),
            host: "localhost".to_string(),
            port: 7777,
            log_prefix: "GRS*_^".to_string(),
            tunnel: Some("grsonline".to_string()),
            online: false,
            notify: false,
            open: false,
        }
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// HTML minifier switches.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HtmlSettings {
    /// Keep IE conditional comments.
    pub conditionals: bool,
    /// Keep redundant attributes and optional tags.
    pub spare: bool,
}

impl Default for HtmlSettings {
    fn default() -> Self {
        Self {
            conditionals: true,
            spare: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CssSettings {
    /// Browserslist queries used for vendor prefixing.
    pub browsers: Vec<String>,
}

impl Default for CssSettings {
    fn default() -> Self {
        Self {
            browsers: vec!["last 5 versions".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpriteSettings {
    pub image_name: String,
    pub css_name: String,
    pub padding: u32,
    /// Prepended to every sprite name in the generated stylesheet.
    pub prefix: String,
}

impl Default for SpriteSettings {
    fn default() -> Self {
        Self {
            image_name: "sprites.png".to_string(),
            css_name: "_sprites.scss".to_string(),
            padding: 20,
            prefix: "s-".to_string(),
        }
    }
}

/// Settings bound to a project root; the value every task receives.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }

    /// Load `config_path` and use its directory as the project root.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let settings = Settings::load(config_path)?;
        let root = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self::new(root, settings))
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let trimmed = relative.trim_start_matches("./");
        self.root.join(trimmed)
    }

    pub fn paths(&self) -> &PathTable {
        &self.settings.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_builtin_table() {
        let settings = Settings::default();

        assert_eq!(settings.paths.dist.css, "dist/css/");
        assert_eq!(settings.paths.dist.sprites, "../img/sprites.png");
        assert_eq!(settings.paths.tmp.js, ".tmp/js");
        assert_eq!(settings.paths.app.scss.main, "app/scss/main.scss");
        assert_eq!(settings.paths.watch.js.main, "app/js/**/*.js");
        assert_eq!(settings.paths.clean.tmp, ".tmp");
        assert_eq!(settings.server.port, 7777);
        assert_eq!(settings.server.base_dir, "./dist");
        assert_eq!(settings.sprites.padding, 20);
        assert_eq!(settings.css.browsers, vec!["last 5 versions".to_string()]);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let settings = Settings::parse(
            r#"
[paths.dist]
css = "public/css/"

[server]
port = 8080
notify = true
"#,
        )
        .unwrap();

        assert_eq!(settings.paths.dist.css, "public/css/");
        assert_eq!(settings.paths.dist.js, "dist/js/");
        assert_eq!(settings.server.port, 8080);
        assert!(settings.server.notify);
        assert_eq!(settings.server.host, "localhost");
    }

    #[test]
    fn empty_tunnel_disables_it() {
        let settings = Settings::parse("[server]\ntunnel = \"\"\n").unwrap();
        assert_eq!(settings.server.tunnel, None);

        let settings = Settings::parse("[server]\ntunnel = \"mysite\"\n").unwrap();
        assert_eq!(settings.server.tunnel.as_deref(), Some("mysite"));

        let settings = Settings::parse("[server]\nport = 8080\n").unwrap();
        assert_eq!(settings.server.tunnel.as_deref(), Some("grsonline"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let settings = Settings::load(&temp.path().join("tessera.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tessera.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn project_root_is_config_directory() {
        let temp = tempdir().unwrap();
        let project = Project::load(&temp.path().join("tessera.toml")).unwrap();

        assert_eq!(project.root, temp.path());
        assert_eq!(project.resolve("./dist"), temp.path().join("dist"));
    }
}
