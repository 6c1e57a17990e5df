#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use frontkit::engine::Task;
use frontkit::transform::ScriptCompiler;
use frontkit::{Collaborators, Composer, Config, TransformError};
use image::{ImageFormat, Rgba, RgbaImage};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests, logs are only shown for failing tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

pub const INDEX: &str = r#"<!doctype html>
<html>
<head>
<link rel="stylesheet" href="styles/main.scss">
<script src="js/js.js" defer></script>
</head>
<body>
{% include 'partials/nav.twig' %}
<img src="images/logo.png">
</body>
</html>
"#;

/// A temporary project with one file of every asset kind.
pub struct Fixture {
    _dir: tempfile::TempDir,
    pub root: Utf8PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();

        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let fixture = Self { _dir: dir, root };

        fixture.write("src/index.twig", INDEX);
        fixture.write("src/partials/nav.twig", "<nav>{{ mode }}</nav>");
        fixture.write("src/styles/base/_colors.scss", "$accent: #336699;\n");
        fixture.write(
            "src/styles/main.scss",
            "@import 'base/colors';\nbody { nav { color: $accent; } }\n",
        );
        fixture.write("src/js/js.js", "const greet = (name) => `hi ${name}`;\n");
        fixture.write("src/js/modules/menu.js", "export const open = true;\n");
        fixture.write("src/images/icon.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        fixture.write("src/fonts/inter.woff2", [0x77u8, 0x4f, 0x46, 0x32, 0, 1, 2, 3]);

        let logo = RgbaImage::from_pixel(8, 8, Rgba([51, 102, 153, 255]));
        let logo_path = fixture.root.join("src/images/logo.png");
        logo.save_with_format(&logo_path, ImageFormat::Png).unwrap();

        fixture
    }

    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, data: impl AsRef<[u8]>) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn config(&self) -> Config {
        Config::default().with_root(&self.root)
    }

    pub fn composer(&self, scripts: Arc<dyn ScriptCompiler>) -> Composer {
        let config = self.config();
        let mut collaborators = Collaborators::defaults(&config);
        collaborators.scripts = scripts;
        Composer::new(config, collaborators).unwrap()
    }
}

/// Stand-in for esbuild: tags the output instead of transpiling it.
pub struct FakeScripts;

impl ScriptCompiler for FakeScripts {
    fn downlevel(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError> {
        let code = fs::read_to_string(path)?;
        Ok(format!("/* es2015 */\n{code}").into_bytes())
    }

    fn minify(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError> {
        let code = fs::read_to_string(path)?;
        Ok(code.split_whitespace().collect::<String>().into_bytes())
    }
}

/// A script compiler rejecting every file.
pub struct BrokenScripts;

impl ScriptCompiler for BrokenScripts {
    fn downlevel(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError> {
        Err(TransformError::Script(path.to_owned(), "unexpected token".into()))
    }

    fn minify(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError> {
        self.downlevel(path)
    }
}

pub fn noop_start_watch() -> Arc<Task> {
    Task::new("start-watch", || Ok(())).into_arc()
}

/// Content hash of every file below `root`, keyed by relative path.
pub fn tree_hash(root: &Utf8Path) -> BTreeMap<String, String> {
    let mut acc = BTreeMap::new();
    let pattern = format!("{}/**/*", glob::Pattern::escape(root.as_str()));

    for entry in glob::glob(&pattern).unwrap() {
        let path = Utf8PathBuf::try_from(entry.unwrap()).unwrap();
        if !path.is_file() {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap().to_string();
        let hash = blake3::hash(&fs::read(&path).unwrap()).to_hex().to_string();
        acc.insert(relative, hash);
    }

    acc
}

/// Wait for a file written by a task that may still be running.
pub fn wait_for(path: &Utf8Path) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
