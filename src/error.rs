use std::sync::mpsc::RecvError;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Removing an output root failed.
#[derive(Debug, Error)]
#[error("Couldn't remove output root '{root}'.\n{source}")]
pub struct CleanError {
    pub root: Utf8PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A single asset transform failed to convert its sources.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Couldn't read or write file.\n{0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Path '{path}' is outside of '{base}'")]
    OutsideBase { path: Utf8PathBuf, base: Utf8PathBuf },

    #[error("Template '{0}':\n{1}")]
    Template(Utf8PathBuf, #[source] minijinja::Error),

    #[error("Stylesheet '{0}':\n{1}")]
    Style(Utf8PathBuf, #[source] Box<grass::Error>),

    #[error("Script '{0}':\n{1}")]
    Script(Utf8PathBuf, String),

    #[error("Image '{0}':\n{1}")]
    Image(Utf8PathBuf, #[source] image::ImageError),

    #[error("Couldn't serialize source map.\n{0}")]
    SourceMap(#[from] serde_json::Error),
}

/// Anything a task action may fail with.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// A failure surfaced by the task runner, aborting the current graph.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task '{task}':\n{source}")]
    Failed {
        task: String,
        #[source]
        source: ActionError,
    },

    #[error("Task '{task}' panicked: {message}")]
    Panicked { task: String, message: String },

    #[error("Couldn't spawn a worker thread.\n{0}")]
    Spawn(#[source] std::io::Error),

    #[error("A parallel task exited without reporting a result")]
    Barrier(#[from] RecvError),
}

impl TaskError {
    /// Name of the task responsible for this failure, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            TaskError::Failed { task, .. } | TaskError::Panicked { task, .. } => Some(task),
            TaskError::Spawn(_) | TaskError::Barrier(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error("Couldn't compile watch pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Watch pattern '{0}' has no existing base directory")]
    MissingBase(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Couldn't bind the live reload socket on port {port}.\n{source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't spawn a server thread.\n{0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file '{0}'.\n{1}")]
    Read(Utf8PathBuf, #[source] std::io::Error),

    #[error("Invalid config file '{0}'.\n{1}")]
    Parse(Utf8PathBuf, #[source] toml::de::Error),

    #[error("Couldn't resolve the project root.\n{0}")]
    Root(#[source] std::io::Error),

    #[error("Project root is not valid UTF-8.\n{0}")]
    RootFormat(#[from] camino::FromPathBufError),

    #[error("Output root '{path}' {reason}")]
    OutputRoot {
        path: Utf8PathBuf,
        reason: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum FrontkitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Couldn't set up watch bindings.\n{0}")]
    Watch(#[from] WatchError),

    #[error("Error while running the '{0}' pipeline.\n{1}")]
    Pipeline(&'static str, #[source] TaskError),
}
