use std::process::{Command, Stdio};
use std::sync::Arc;

use camino::Utf8Path;

use crate::error::TransformError;
use crate::io::{SourceFile, with_suffix, write_output};
use crate::transform::{Route, Transform, Variant};

/// Lowers script syntax for older runtimes, optionally minifying.
pub trait ScriptCompiler: Send + Sync {
    fn downlevel(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError>;
    fn minify(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError>;
}

/// Runs the `esbuild` executable.
///
/// **Note:** requires `esbuild` to be available, either in `PATH` or at the
/// configured location.
#[derive(Debug, Clone)]
pub struct EsbuildCompiler {
    program: String,
    target: String,
}

impl EsbuildCompiler {
    pub fn new(program: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            target: target.into(),
        }
    }

    fn invoke(&self, path: &Utf8Path, minify: bool) -> Result<Vec<u8>, TransformError> {
        let mut command = Command::new(&self.program);
        command
            .arg(path.as_str())
            .arg(format!("--target={}", self.target))
            .arg("--log-level=warning")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if minify {
            command.arg("--minify");
        }

        let output = command.output().map_err(|e| {
            TransformError::Script(path.to_owned(), format!("couldn't run '{}': {e}", self.program))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(TransformError::Script(path.to_owned(), stderr));
        }

        Ok(output.stdout)
    }
}

impl ScriptCompiler for EsbuildCompiler {
    fn downlevel(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError> {
        self.invoke(path, false)
    }

    fn minify(&self, path: &Utf8Path) -> Result<Vec<u8>, TransformError> {
        self.invoke(path, true)
    }
}

/// Downlevels scripts; the prod variant also writes `<name>.min.js` next to
/// the unminified output.
pub struct ScriptsTransform {
    pub route: Route,
    pub variant: Variant,
    pub compiler: Arc<dyn ScriptCompiler>,
}

impl ScriptsTransform {
    fn process(&self, source: &SourceFile) -> Result<(), TransformError> {
        let code = self.compiler.downlevel(&source.path)?;
        write_output(&self.route.output(&with_suffix(&source.relative, "js")), code)?;

        if self.variant == Variant::Prod {
            let min = self.compiler.minify(&source.path)?;
            write_output(&self.route.output(&with_suffix(&source.relative, "min.js")), min)?;
        }

        Ok(())
    }
}

impl Transform for ScriptsTransform {
    fn run(&self) -> Result<(), TransformError> {
        self.route.for_each(|source| self.process(source))?;
        Ok(())
    }
}
