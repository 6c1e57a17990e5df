use std::collections::HashSet;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};

use super::{EventSource, WatchBinding};
use crate::error::WatchError;

/// Filesystem events from `notify`, debounced.
///
/// Watches the static directory prefix of every binding pattern recursively,
/// collapsed to the minimal set of roots, and forwards the paths touched by
/// create, modify and remove events. Events arriving within the debounce
/// window are delivered as one batch.
pub struct NotifySource {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    receiver: Receiver<DebounceEventResult>,
}

impl NotifySource {
    pub fn new(bindings: &[WatchBinding], debounce: Duration) -> Result<Self, WatchError> {
        let (tx, receiver) = channel();
        let mut debouncer = new_debouncer(debounce, None, tx)?;

        let mut roots = HashSet::new();
        for binding in bindings {
            roots.insert(resolve_watch_root(binding.pattern())?);
        }

        for root in collapse_watch_paths(roots) {
            tracing::info!("watching {}", root);
            debouncer.watch(root.as_std_path(), RecursiveMode::Recursive)?;
        }

        Ok(Self {
            _debouncer: debouncer,
            receiver,
        })
    }
}

impl EventSource for NotifySource {
    fn next_batch(&mut self) -> Option<Result<Vec<Utf8PathBuf>, WatchError>> {
        let events = match self.receiver.recv().ok()? {
            Ok(events) => events,
            Err(errors) => {
                let mut errors = errors.into_iter();
                let Some(first) = errors.next() else {
                    return Some(Ok(vec![]));
                };

                for e in errors {
                    tracing::error!("watch error: {e}");
                }
                return Some(Err(first.into()));
            }
        };

        let mut paths = Vec::new();
        for de in events {
            if !matches!(
                de.event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                continue;
            }

            for path in &de.event.paths {
                match Utf8Path::from_path(path) {
                    Some(path) if !paths.iter().any(|p: &Utf8PathBuf| p == path) => {
                        paths.push(path.to_owned());
                    }
                    Some(_) => {}
                    None => tracing::warn!("ignoring non UTF-8 path {}", path.display()),
                }
            }
        }

        tracing::debug!("{} paths changed", paths.len());
        Some(Ok(paths))
    }
}

/// Static directory prefix of a glob pattern, the part before the first
/// component containing a wildcard. A prefix that does not exist yet is
/// replaced by its nearest existing ancestor, so directories created later are
/// still picked up.
fn resolve_watch_root(pattern: &str) -> Result<Utf8PathBuf, WatchError> {
    let path = Utf8Path::new(pattern);

    let mut root: Utf8PathBuf = path
        .components()
        .take_while(|c| !c.as_str().contains(['*', '?', '[']))
        .collect();

    while !root.is_dir() {
        match root.parent() {
            Some(parent) if !parent.as_str().is_empty() => root = parent.to_path_buf(),
            _ => return Err(WatchError::MissingBase(pattern.to_string())),
        }
    }

    Ok(root)
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because the watcher
/// is recursive.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
