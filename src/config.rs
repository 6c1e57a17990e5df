//! Project configuration.
//!
//! Every value has a default that matches the conventional layout:
//!
//! ```text
//! src/*.twig              templates
//! src/styles/**/*.scss    stylesheets
//! src/js/*.js             scripts
//! src/images/**/*.*       images
//! src/fonts/**/*.*        fonts
//! ```
//!
//! An optional `frontkit.toml` in the project root overrides any of them.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::io::normalize;

pub const CONFIG_FILE: &str = "frontkit.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root, every other path is relative to it.
    pub root: Utf8PathBuf,
    pub source: Utf8PathBuf,
    /// Development output root.
    pub dist: Utf8PathBuf,
    /// Production output root.
    pub build: Utf8PathBuf,
    /// Directory for content-addressed intermediate artifacts.
    pub cache: Utf8PathBuf,
    pub markup: MarkupConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            source: Utf8PathBuf::from("src"),
            dist: Utf8PathBuf::from("dist"),
            build: Utf8PathBuf::from("build"),
            cache: Utf8PathBuf::from(".cache"),
            markup: MarkupConfig::default(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            images: ImagesConfig::default(),
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

/// A literal search-and-replace applied to rendered templates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rewrite(pub String, pub String);

impl Rewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self(from.into(), to.into())
    }

    pub fn apply(&self, text: &str) -> String {
        text.replace(&self.0, &self.1)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    pub extension: String,
    pub output_extension: String,
    /// Inject the live reload client into development pages.
    pub live_reload: bool,
    pub dev_rewrites: Vec<Rewrite>,
    pub prod_rewrites: Vec<Rewrite>,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            extension: "twig".into(),
            output_extension: "html".into(),
            live_reload: true,
            dev_rewrites: vec![Rewrite::new(".scss", ".css")],
            // Applied in order, the specific rules must come first.
            prod_rewrites: vec![
                Rewrite::new("styles/main.scss", "styles/main.min.css"),
                Rewrite::new("js/js.js", "js/js.min.js"),
                Rewrite::new(".scss", ".min.css"),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    pub extension: String,
    pub source_maps: bool,
    pub dev_continue_on_error: bool,
    pub prod_continue_on_error: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            extension: "scss".into(),
            source_maps: true,
            dev_continue_on_error: true,
            prod_continue_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    pub extension: String,
    /// Path or name of the esbuild executable.
    pub esbuild: String,
    /// Syntax level scripts are lowered to.
    pub target: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            extension: "js".into(),
            esbuild: "esbuild".into(),
            target: "es2015".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Extensions (case-insensitive) that also get a WebP copy.
    pub webp_extensions: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            webp_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub http_port: u16,
    pub reload_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            reload_port: 1337,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Window in which bursts of file events are coalesced.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

impl Config {
    /// Load `frontkit.toml` from `root` if it exists, defaults otherwise. The
    /// root itself always comes from the caller, a relative root is anchored
    /// at the current working directory.
    pub fn load(root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let root = Utf8PathBuf::try_from(
            std::path::absolute(root.as_std_path()).map_err(ConfigError::Root)?,
        )?;
        let path = root.join(CONFIG_FILE);

        let mut config = match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text).map_err(|e| ConfigError::Parse(path.clone(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(ConfigError::Read(path, e)),
        };

        config.root = root;
        config.validate()?;
        Ok(config)
    }

    /// Check that the two output roots are disjoint from each other and from
    /// the sources. Cleaning removes an output root wholesale, so an output
    /// root covering the project or the sources would delete them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // `..` can only be resolved against an absolute root
        let root = std::path::absolute(self.root.as_std_path()).map_err(ConfigError::Root)?;
        let root = normalize(&Utf8PathBuf::try_from(root)?);
        let source = normalize(&root.join(&self.source));
        let dist = normalize(&root.join(&self.dist));
        let build = normalize(&root.join(&self.build));

        if dist == build {
            return Err(ConfigError::OutputRoot {
                path: self.dist_dir(),
                reason: "is used by both the dev and the build pipeline",
            });
        }

        for (out, path) in [(&dist, self.dist_dir()), (&build, self.build_dir())] {
            let reason = if root.starts_with(out) {
                "contains the project root"
            } else if source.starts_with(out) {
                "contains the source directory"
            } else if out.starts_with(&source) {
                "is inside the source directory"
            } else {
                continue;
            };

            return Err(ConfigError::OutputRoot { path, reason });
        }

        Ok(())
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load the config for the current working directory.
    pub fn from_cwd() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::Root)?;
        let cwd = Utf8PathBuf::try_from(cwd)?;
        Self::load(cwd)
    }

    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn source_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.source)
    }

    pub fn dist_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.dist)
    }

    pub fn build_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.build)
    }

    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.cache)
    }

    pub fn styles_dir(&self) -> Utf8PathBuf {
        self.source_dir().join("styles")
    }

    pub fn scripts_dir(&self) -> Utf8PathBuf {
        self.source_dir().join("js")
    }

    pub fn images_dir(&self) -> Utf8PathBuf {
        self.source_dir().join("images")
    }

    pub fn fonts_dir(&self) -> Utf8PathBuf {
        self.source_dir().join("fonts")
    }

    /// Top-level templates only.
    pub fn markup_glob(&self) -> String {
        join_glob(&self.source_dir(), &format!("*.{}", self.markup.extension))
    }

    pub fn styles_glob(&self) -> String {
        join_glob(&self.styles_dir(), &format!("**/*.{}", self.styles.extension))
    }

    /// Scripts are built flat, non-recursively.
    pub fn scripts_glob(&self) -> String {
        join_glob(&self.scripts_dir(), &format!("*.{}", self.scripts.extension))
    }

    /// Scripts are watched recursively, so nested modules trigger a rebuild.
    pub fn scripts_watch_glob(&self) -> String {
        join_glob(&self.scripts_dir(), &format!("**/*.{}", self.scripts.extension))
    }

    pub fn images_glob(&self) -> String {
        join_glob(&self.images_dir(), "**/*.*")
    }

    pub fn fonts_glob(&self) -> String {
        join_glob(&self.fonts_dir(), "**/*.*")
    }
}

/// Join a literal directory and a glob suffix, escaping any glob
/// metacharacters in the directory part.
fn join_glob(dir: &Utf8Path, pattern: &str) -> String {
    let dir = glob::Pattern::escape(dir.as_str());
    format!("{}/{}", dir.trim_end_matches('/'), pattern)
}
