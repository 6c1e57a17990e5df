use std::fs;
use std::sync::Arc;

use camino::Utf8Path;
use serde::Serialize;

use crate::error::TransformError;
use crate::io::{SourceFile, with_suffix, write_output};
use crate::transform::{Route, Transform, Variant};

/// Formatting of compiled CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleOutput {
    Expanded,
    Compressed,
}

/// Compiles one stylesheet entry point to CSS.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, path: &Utf8Path, output: StyleOutput) -> Result<String, TransformError>;
}

/// SCSS compiler backed by `grass`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassCompiler;

impl StyleCompiler for GrassCompiler {
    fn compile(&self, path: &Utf8Path, output: StyleOutput) -> Result<String, TransformError> {
        let style = match output {
            StyleOutput::Expanded => grass::OutputStyle::Expanded,
            StyleOutput::Compressed => grass::OutputStyle::Compressed,
        };

        let options = grass::Options::default().style(style);

        grass::from_path(path.as_std_path(), &options)
            .map_err(|e| TransformError::Style(path.to_owned(), e))
    }
}

/// Version 3 source map of a single entry stylesheet. grass does not track
/// output positions, so `mappings` stays empty: browsers list the original
/// source through `sourcesContent` but cannot map rules back to lines.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMap<'a> {
    version: u8,
    file: &'a str,
    source_root: &'a str,
    sources: Vec<String>,
    sources_content: Vec<String>,
    names: Vec<String>,
    mappings: &'a str,
}

/// Compiles stylesheets. Files whose name starts with `_` are partials and
/// are only compiled through the entry points importing them.
///
/// * dev: `<name>.css` plus a `<name>.css.map` carrying the entry source
///   without line mappings;
/// * prod: `<name>.css` plus a compressed `<name>.min.css`.
pub struct StylesTransform {
    pub route: Route,
    pub variant: Variant,
    pub source_maps: bool,
    pub compiler: Arc<dyn StyleCompiler>,
}

impl StylesTransform {
    fn process(&self, source: &SourceFile) -> Result<(), TransformError> {
        if is_partial(&source.relative) {
            return Ok(());
        }

        let css_path = self.route.output(&with_suffix(&source.relative, "css"));
        let css = self.compiler.compile(&source.path, StyleOutput::Expanded)?;

        match self.variant {
            Variant::Dev if self.source_maps => {
                let file = css_path.file_name().unwrap_or_default();
                let map_name = format!("{file}.map");
                let map = self.source_map(source, file)?;

                write_output(&css_path.with_file_name(&map_name), map)?;
                write_output(
                    &css_path,
                    format!("{css}\n/*# sourceMappingURL={map_name} */\n"),
                )?;
            }
            Variant::Dev => write_output(&css_path, css)?,
            Variant::Prod => {
                write_output(&css_path, css)?;

                let min = self.compiler.compile(&source.path, StyleOutput::Compressed)?;
                let min_path = self.route.output(&with_suffix(&source.relative, "min.css"));
                write_output(&min_path, min)?;
            }
        }

        Ok(())
    }

    fn source_map(&self, source: &SourceFile, file: &str) -> Result<String, TransformError> {
        let content = fs::read_to_string(&source.path)?;
        let name = source
            .relative
            .components()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/");

        let map = SourceMap {
            version: 3,
            file,
            source_root: "/source/",
            sources: vec![name],
            sources_content: vec![content],
            names: vec![],
            mappings: "",
        };

        Ok(serde_json::to_string(&map)?)
    }
}

impl Transform for StylesTransform {
    fn run(&self) -> Result<(), TransformError> {
        self.route.for_each(|source| self.process(source))?;
        Ok(())
    }
}

fn is_partial(relative: &Utf8Path) -> bool {
    relative.file_name().is_some_and(|name| name.starts_with('_'))
}
