//! Asset transforms: each one reads the files matched by a glob, converts
//! them and writes the results under an output root, mirroring the relative
//! layout of the sources.
//!
//! The conversions themselves are done by collaborators behind small traits
//! ([`TemplateRenderer`], [`StyleCompiler`], [`ScriptCompiler`],
//! [`ImageEncoder`]), so the pipeline can be exercised with fakes and the
//! default implementations can be swapped out.

mod copy;
mod markup;
mod scripts;
mod styles;
mod webp;

use std::fmt::Display;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::TransformError;
use crate::io::{SourceFile, collect_sources};

pub use copy::CopyTransform;
pub use markup::{MarkupTransform, MiniJinjaRenderer, TemplateRenderer, reload_script};
pub use scripts::{EsbuildCompiler, ScriptCompiler, ScriptsTransform};
pub use styles::{GrassCompiler, StyleCompiler, StyleOutput, StylesTransform};
pub use webp::{ImageEncoder, WebpEncoder, WebpTransform};

/// Which flavour of output a transform produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Fast, unminified output for the development server.
    Dev,
    /// Optimized output for deployment.
    Prod,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Dev => "dev",
            Variant::Prod => "prod",
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The asset classes the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Markup,
    Styles,
    Scripts,
    Images,
    ImagesWebp,
    Fonts,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Markup => "markup",
            AssetKind::Styles => "styles",
            AssetKind::Scripts => "scripts",
            AssetKind::Images => "images",
            AssetKind::ImagesWebp => "images-webp",
            AssetKind::Fonts => "fonts",
        }
    }

    /// Task name for this kind in the given variant, e.g. `styles-prod`.
    pub fn task_name(self, variant: Variant) -> String {
        format!("{}-{}", self.as_str(), variant)
    }
}

/// Where a transform reads from and writes to.
#[derive(Debug, Clone)]
pub struct Route {
    /// Glob selecting the source files.
    pub glob: String,
    /// Static directory the glob starts in; output paths are relative to it.
    pub base: Utf8PathBuf,
    /// Directory the outputs are written to.
    pub target: Utf8PathBuf,
}

impl Route {
    pub fn new(glob: impl Into<String>, base: impl Into<Utf8PathBuf>, target: impl Into<Utf8PathBuf>) -> Self {
        Self {
            glob: glob.into(),
            base: base.into(),
            target: target.into(),
        }
    }

    pub fn sources(&self) -> Result<Vec<SourceFile>, TransformError> {
        collect_sources(&self.glob, &self.base)
    }

    /// Output path for a source's relative path.
    pub fn output(&self, relative: &Utf8Path) -> Utf8PathBuf {
        self.target.join(relative)
    }

    /// Run `f` for every source on the rayon pool, failing on the first
    /// error. Returns the number of processed files.
    pub(crate) fn for_each<F>(&self, f: F) -> Result<usize, TransformError>
    where
        F: Fn(&SourceFile) -> Result<(), TransformError> + Send + Sync,
    {
        self.for_each_of(self.sources()?, f)
    }

    /// Like [`Route::for_each`], over an already selected set of sources.
    pub(crate) fn for_each_of<F>(&self, sources: Vec<SourceFile>, f: F) -> Result<usize, TransformError>
    where
        F: Fn(&SourceFile) -> Result<(), TransformError> + Send + Sync,
    {
        let count = sources.len();

        sources
            .into_par_iter()
            .try_for_each(|source| f(&source))?;

        tracing::debug!("{} -> {}: {} files", self.glob, self.target, count);
        Ok(count)
    }
}

/// A stateless conversion of one asset class.
pub trait Transform: Send + Sync {
    fn run(&self) -> Result<(), TransformError>;
}
