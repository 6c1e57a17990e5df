//! The two named pipelines and the watch bindings of the dev pipeline.
//!
//! Every asset kind gets one task per variant, built once from the static
//! configuration. The graphs returned here and the watch bindings share the
//! very same [`Task`] instances, so a re-run triggered by the watcher can never
//! overlap with another run of the same transform.

use std::fmt::Display;
use std::sync::Arc;

use clap::ValueEnum;

use crate::config::Config;
use crate::engine::{Task, TaskGraph};
use crate::error::{ConfigError, WatchError};
use crate::io::clean;
use crate::transform::{
    AssetKind, CopyTransform, EsbuildCompiler, GrassCompiler, ImageEncoder, MarkupTransform,
    MiniJinjaRenderer, Route, ScriptCompiler, ScriptsTransform, StyleCompiler, StylesTransform,
    TemplateRenderer, Transform, Variant, WebpEncoder, WebpTransform,
};
use crate::watch::WatchBinding;

/// A pipeline that can be selected from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PipelineName {
    /// Development build, then serve and watch for changes.
    #[default]
    #[value(alias = "default")]
    Dev,
    /// Optimized production build.
    Build,
}

impl PipelineName {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineName::Dev => "dev",
            PipelineName::Build => "build",
        }
    }
}

impl Display for PipelineName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External converters used by the transforms.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn TemplateRenderer>,
    pub styles: Arc<dyn StyleCompiler>,
    pub scripts: Arc<dyn ScriptCompiler>,
    pub images: Arc<dyn ImageEncoder>,
}

impl Collaborators {
    pub fn defaults(config: &Config) -> Self {
        Self {
            renderer: Arc::new(MiniJinjaRenderer::new(config.source_dir())),
            styles: Arc::new(GrassCompiler),
            scripts: Arc::new(EsbuildCompiler::new(
                &config.scripts.esbuild,
                &config.scripts.target,
            )),
            images: Arc::new(WebpEncoder),
        }
    }
}

/// One task per asset kind for a single variant.
struct VariantTasks {
    markup: Arc<Task>,
    styles: Arc<Task>,
    scripts: Arc<Task>,
    images: Arc<Task>,
    images_webp: Arc<Task>,
    fonts: Arc<Task>,
}

impl VariantTasks {
    fn new(config: &Config, collaborators: &Collaborators, variant: Variant) -> Self {
        let out = match variant {
            Variant::Dev => config.dist_dir(),
            Variant::Prod => config.build_dir(),
        };

        let (rewrites, reload_port) = match variant {
            Variant::Dev => (
                config.markup.dev_rewrites.clone(),
                config.markup.live_reload.then_some(config.server.reload_port),
            ),
            Variant::Prod => (config.markup.prod_rewrites.clone(), None),
        };

        let continue_on_error = match variant {
            Variant::Dev => config.styles.dev_continue_on_error,
            Variant::Prod => config.styles.prod_continue_on_error,
        };

        let markup = MarkupTransform {
            route: Route::new(config.markup_glob(), config.source_dir(), &out),
            variant,
            output_extension: config.markup.output_extension.clone(),
            rewrites,
            reload_port,
            renderer: collaborators.renderer.clone(),
        };

        let styles = StylesTransform {
            route: Route::new(config.styles_glob(), config.styles_dir(), out.join("styles")),
            variant,
            source_maps: config.styles.source_maps,
            compiler: collaborators.styles.clone(),
        };

        let scripts = ScriptsTransform {
            route: Route::new(config.scripts_glob(), config.scripts_dir(), out.join("js")),
            variant,
            compiler: collaborators.scripts.clone(),
        };

        let images = CopyTransform {
            route: Route::new(config.images_glob(), config.images_dir(), out.join("images")),
        };

        let images_webp = WebpTransform {
            route: Route::new(config.images_glob(), config.images_dir(), out.join("images")),
            extensions: config.images.webp_extensions.clone(),
            encoder: collaborators.images.clone(),
            cache: Some(config.cache_dir().join("webp")),
        };

        let fonts = CopyTransform {
            route: Route::new(config.fonts_glob(), config.fonts_dir(), out.join("fonts")),
        };

        Self {
            markup: transform_task(AssetKind::Markup, variant, markup).into_arc(),
            styles: transform_task(AssetKind::Styles, variant, styles)
                .continue_on_error(continue_on_error)
                .into_arc(),
            scripts: transform_task(AssetKind::Scripts, variant, scripts).into_arc(),
            images: transform_task(AssetKind::Images, variant, images).into_arc(),
            images_webp: transform_task(AssetKind::ImagesWebp, variant, images_webp).into_arc(),
            fonts: transform_task(AssetKind::Fonts, variant, fonts).into_arc(),
        }
    }
}

fn transform_task<T>(kind: AssetKind, variant: Variant, transform: T) -> Task
where
    T: Transform + 'static,
{
    Task::new(kind.task_name(variant), move || Ok(transform.run()?))
}

fn clean_task(name: &str, root: camino::Utf8PathBuf) -> Arc<Task> {
    Task::new(name, move || Ok(clean(&root)?)).into_arc()
}

/// Declares the `dev` and `build` pipelines over a fixed set of tasks.
pub struct Composer {
    config: Config,
    clean_dist: Arc<Task>,
    clean_build: Arc<Task>,
    dev: VariantTasks,
    prod: VariantTasks,
}

impl Composer {
    /// Fails when the configured output roots overlap the project or each
    /// other, nothing is cleaned in that case.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;

        let dev = VariantTasks::new(&config, &collaborators, Variant::Dev);
        let prod = VariantTasks::new(&config, &collaborators, Variant::Prod);

        Ok(Self {
            clean_dist: clean_task("clean-dist", config.dist_dir()),
            clean_build: clean_task("clean-build", config.build_dir()),
            config,
            dev,
            prod,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Production pipeline, every step strictly in order.
    pub fn build(&self) -> TaskGraph {
        let t = &self.prod;

        TaskGraph::sequence([
            TaskGraph::task(&self.clean_dist),
            TaskGraph::task(&self.clean_build),
            TaskGraph::task(&t.markup),
            TaskGraph::task(&t.styles),
            TaskGraph::task(&t.images),
            TaskGraph::task(&t.images_webp),
            TaskGraph::task(&t.fonts),
            TaskGraph::task(&t.scripts),
        ])
    }

    /// Development pipeline. The independent transforms run in parallel, the
    /// WebP pass waits for the image copy, and `start_watch` runs last.
    pub fn dev(&self, start_watch: Arc<Task>) -> TaskGraph {
        let t = &self.dev;

        TaskGraph::sequence([
            TaskGraph::task(&self.clean_dist),
            TaskGraph::task(&self.clean_build),
            TaskGraph::parallel([
                TaskGraph::task(&t.markup),
                TaskGraph::task(&t.styles),
                TaskGraph::task(&t.images),
                TaskGraph::task(&t.fonts),
                TaskGraph::task(&t.scripts),
            ]),
            TaskGraph::task(&t.images_webp),
            TaskGraph::from(start_watch),
        ])
    }

    /// What the watcher re-runs for each group of source files.
    pub fn watch_bindings(&self) -> Result<Vec<WatchBinding>, WatchError> {
        let config = &self.config;
        let t = &self.dev;

        Ok(vec![
            WatchBinding::new(
                "markup",
                &config.markup_glob(),
                TaskGraph::task(&t.markup),
            )?,
            WatchBinding::new(
                "styles",
                &config.styles_glob(),
                TaskGraph::task(&t.styles),
            )?,
            WatchBinding::new(
                "scripts",
                &config.scripts_watch_glob(),
                TaskGraph::task(&t.scripts),
            )?,
            WatchBinding::new(
                "images",
                &config.images_glob(),
                TaskGraph::sequence([
                    TaskGraph::task(&t.images),
                    TaskGraph::task(&t.images_webp),
                ]),
            )?,
            WatchBinding::new("fonts", &config.fonts_glob(), TaskGraph::task(&t.fonts))?,
        ])
    }
}
