#![forbid(unsafe_code)]
//! A front-end asset pipeline.
//!
//! Turns a source tree of templates, stylesheets, scripts, images and fonts
//! into two output trees: `dist/`, an unminified development tree served with
//! live reload, and `build/`, the optimized production tree.
//!
//! The work is declared as a [`TaskGraph`] of named tasks, composed into two
//! pipelines by the [`Composer`]:
//!
//! * `build`: clean both output roots, then every production transform in
//!   order;
//! * `dev`: clean both output roots, run the development transforms in
//!   parallel, then serve `dist/` and watch the sources, re-running only the
//!   transforms whose inputs changed and reloading connected browsers.
//!
//! ```no_run
//! use frontkit::{Config, PipelineName};
//!
//! let config = Config::from_cwd()?;
//! frontkit::run(PipelineName::Build, &config)?;
//! # Ok::<(), frontkit::FrontkitError>(())
//! ```

pub mod config;
pub mod engine;
mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod transform;
mod utils;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

pub use crate::config::Config;
pub use crate::engine::{Task, TaskGraph};
pub use crate::error::*;
pub use crate::pipeline::{Collaborators, Composer, PipelineName};

use crate::server::DevServer;
use crate::watch::{NotifySource, WatchBinding, WatchController};

/// Run a pipeline with the default collaborators.
pub fn run(name: PipelineName, config: &Config) -> Result<(), FrontkitError> {
    run_with(name, config.clone(), Collaborators::defaults(config))
}

/// Run a pipeline with custom collaborators.
///
/// The `dev` pipeline only returns when it fails, its last step keeps
/// watching for changes until the process exits.
pub fn run_with(
    name: PipelineName,
    config: Config,
    collaborators: Collaborators,
) -> Result<(), FrontkitError> {
    let composer = Composer::new(config, collaborators)?;

    let graph = match name {
        PipelineName::Build => composer.build(),
        PipelineName::Dev => {
            let start_watch = start_watch(composer.config(), composer.watch_bindings()?);
            composer.dev(start_watch)
        }
    };

    tracing::debug!("running {name}:\n{graph}");
    engine::run(&graph).map_err(|e| FrontkitError::Pipeline(name.as_str(), e))
}

/// Terminal step of the dev pipeline: serve the output root, then hand the
/// filesystem events over to a watch controller.
fn start_watch(config: &Config, bindings: Vec<WatchBinding>) -> Arc<Task> {
    let server_config = config.server.clone();
    let dist = config.dist_dir();
    let debounce = Duration::from_millis(config.watch.debounce_ms);

    Task::new("start-watch", move || {
        let server = DevServer::start(&server_config, &dist)?;
        let source = NotifySource::new(&bindings, debounce)?;

        let mut controller =
            WatchController::new(bindings.clone(), source, Arc::new(server.reload_handle()));
        controller.run();

        Ok(())
    })
    .into_arc()
}
