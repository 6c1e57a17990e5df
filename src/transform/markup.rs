use std::sync::Arc;

use camino::Utf8PathBuf;
use minijinja::{Environment, context};

use crate::config::Rewrite;
use crate::error::TransformError;
use crate::io::{SourceFile, with_suffix, write_output};
use crate::transform::{Route, Transform, Variant};

/// Renders one template file to text.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, source: &SourceFile, variant: Variant) -> Result<String, TransformError>;
}

/// Renders Twig-style templates with `minijinja`.
///
/// Templates are looked up relative to `root`, so `{% include %}` and
/// `{% extends %}` resolve against the source directory. A fresh environment
/// is created for every render, edited partials are always picked up in
/// watch mode.
#[derive(Debug, Clone)]
pub struct MiniJinjaRenderer {
    root: Utf8PathBuf,
}

impl MiniJinjaRenderer {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, source: &SourceFile, variant: Variant) -> Result<String, TransformError> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(self.root.as_std_path().to_path_buf()));

        let name = source
            .relative
            .components()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/");

        let error = |e| TransformError::Template(source.path.clone(), e);
        let template = env.get_template(&name).map_err(error)?;

        template
            .render(context! { mode => variant.as_str() })
            .map_err(error)
    }
}

/// Renders top-level templates and rewrites asset references in the result.
pub struct MarkupTransform {
    pub route: Route,
    pub variant: Variant,
    pub output_extension: String,
    pub rewrites: Vec<Rewrite>,
    /// Port of the live reload socket, injects the client when set.
    pub reload_port: Option<u16>,
    pub renderer: Arc<dyn TemplateRenderer>,
}

impl MarkupTransform {
    fn process(&self, source: &SourceFile) -> Result<(), TransformError> {
        let mut text = self.renderer.render(source, self.variant)?;

        for rewrite in &self.rewrites {
            text = rewrite.apply(&text);
        }

        if let Some(port) = self.reload_port {
            text = inject(&text, &reload_script(port));
        }

        let path = self
            .route
            .output(&with_suffix(&source.relative, &self.output_extension));

        write_output(&path, text)
    }
}

impl Transform for MarkupTransform {
    fn run(&self) -> Result<(), TransformError> {
        self.route.for_each(|source| self.process(source))?;
        Ok(())
    }
}

/// Client-side snippet that reloads the page whenever the dev server pushes
/// a message over the live reload socket.
pub fn reload_script(port: u16) -> String {
    format!(
        r#"<script>
const socket = new WebSocket("ws://localhost:{port}");
socket.addEventListener("message", event => {{
    window.location.reload();
}});
</script>
"#
    )
}

/// Insert `snippet` right before the closing body tag, or at the end of the
/// document when there is none.
fn inject(html: &str, snippet: &str) -> String {
    match html.rfind("</body>") {
        Some(i) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..i]);
            out.push_str(snippet);
            out.push_str(&html[i..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}
