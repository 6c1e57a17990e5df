//! Watch mode: re-run the transforms whose sources changed, then reload.
//!
//! The controller owns a list of [`WatchBinding`]s and pulls batches of
//! changed paths from an [`EventSource`]. For every batch:
//!
//! 1. each binding whose pattern matches at least one changed path is re-run,
//!    at most once per batch;
//! 2. if every re-run succeeded, a single reload is signalled through the
//!    [`Reload`] sink.
//!
//! A failing re-run is logged and the loop keeps going. Bursts of events are
//! coalesced by the event source (see [`NotifySource`]), and re-runs of the
//! same task serialize through the task's own lock.

mod source;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};

use crate::engine::{self, TaskGraph};
use crate::error::WatchError;
use crate::utils::as_overhead;

pub use source::NotifySource;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A glob pattern and the part of the dev graph to re-run when a file
/// matching it changes.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    name: String,
    pattern: Pattern,
    graph: TaskGraph,
}

impl WatchBinding {
    pub fn new(name: impl Into<String>, pattern: &str, graph: TaskGraph) -> Result<Self, WatchError> {
        Ok(Self {
            name: name.into(),
            pattern: Pattern::new(pattern)?,
            graph,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// `*` never crosses a directory separator, only `**` does.
    pub fn matches(&self, path: &Utf8Path) -> bool {
        self.pattern.matches_with(path.as_str(), MATCH_OPTIONS)
    }
}

/// Produces batches of changed paths. Returning `None` means no more events
/// will ever arrive.
pub trait EventSource: Send {
    fn next_batch(&mut self) -> Option<Result<Vec<Utf8PathBuf>, WatchError>>;
}

/// Tells connected clients that the output changed.
pub trait Reload: Send + Sync {
    fn reload(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
}

/// What happened in response to one batch of changes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Bindings that were re-run, in declaration order.
    pub rerun: Vec<String>,
    /// Bindings whose re-run failed.
    pub failed: Vec<String>,
    pub reloaded: bool,
}

pub struct WatchController {
    bindings: Vec<WatchBinding>,
    source: Box<dyn EventSource>,
    reload: Arc<dyn Reload>,
    state: WatchState,
}

impl WatchController {
    pub fn new(
        bindings: Vec<WatchBinding>,
        source: impl EventSource + 'static,
        reload: Arc<dyn Reload>,
    ) -> Self {
        Self {
            bindings,
            source: Box::new(source),
            reload,
            state: WatchState::Idle,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Handle batches until the event source is exhausted.
    pub fn run(&mut self) {
        self.state = WatchState::Watching;
        tracing::info!("watching for changes...");

        while let Some(batch) = self.source.next_batch() {
            match batch {
                Ok(paths) => {
                    self.handle(&paths);
                }
                Err(e) => tracing::error!("watch error: {e}"),
            }
        }

        self.state = WatchState::Idle;
        tracing::info!("stopped watching");
    }

    /// Re-run every binding matching at least one of `paths`.
    pub fn handle(&self, paths: &[Utf8PathBuf]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let dirty: Vec<_> = self
            .bindings
            .iter()
            .filter(|binding| paths.iter().any(|path| binding.matches(path)))
            .collect();

        if dirty.is_empty() {
            tracing::debug!("ignoring {} unrelated changes", paths.len());
            return outcome;
        }

        tracing::info!("change detected, re-running {} bindings...", dirty.len());
        let s = Instant::now();

        for binding in dirty {
            outcome.rerun.push(binding.name.clone());

            if let Err(e) = engine::run(&binding.graph) {
                tracing::error!("rebuild of {} failed:\n{e}", binding.name);
                outcome.failed.push(binding.name.clone());
            }
        }

        if outcome.failed.is_empty() {
            self.reload.reload();
            outcome.reloaded = true;
            tracing::info!("rebuild complete {}", as_overhead(s));
        }

        outcome
    }
}

impl Debug for WatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchController")
            .field("bindings", &self.bindings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
