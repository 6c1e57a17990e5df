use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::error::{ActionError, TaskError};
use crate::utils::{STYLE_TASK, as_overhead};

type Action = Box<dyn Fn() -> Result<(), ActionError> + Send + Sync>;

/// A named unit of work in a [`TaskGraph`](super::TaskGraph).
///
/// The action is guarded by a per-task lock, so a task never runs
/// concurrently with itself even when the same task is reachable from the
/// pipeline graph and from a watch binding at the same time.
pub struct Task {
    name: String,
    action: Action,
    continue_on_error: bool,
    lock: Mutex<()>,
}

impl Task {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
            continue_on_error: false,
            lock: Mutex::new(()),
        }
    }

    /// When set, a failing action is logged and reported as a success, so the
    /// graph keeps going. Panics are still reported as failures.
    pub fn continue_on_error(mut self, yes: bool) -> Self {
        self.continue_on_error = yes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Run the action to completion, waiting for any in-flight run of this
    /// same task to finish first.
    pub fn run(&self) -> Result<(), TaskError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let span = tracing::span!(Level::INFO, "task", name = %self.name);
        span.pb_set_style(&STYLE_TASK);
        span.pb_set_message(&format!("Running {}", self.name));
        let _enter = span.enter();

        let s = Instant::now();

        let result = match catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            Ok(result) => result,
            Err(panic) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    String::from("unknown payload")
                };

                return Err(TaskError::Panicked {
                    task: self.name.clone(),
                    message,
                });
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("finished {} {}", self.name, as_overhead(s));
                Ok(())
            }
            Err(e) if self.continue_on_error => {
                tracing::error!("{} failed, continuing:\n{e}", self.name);
                Ok(())
            }
            Err(source) => Err(TaskError::Failed {
                task: self.name.clone(),
                source,
            }),
        }
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("continue_on_error", &self.continue_on_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::CleanError;

    fn failing() -> Result<(), ActionError> {
        Err(CleanError {
            root: "dist".into(),
            source: std::io::Error::other("boom"),
        }
        .into())
    }

    #[test]
    fn failure_is_reported_with_task_name() {
        let task = Task::new("styles-prod", failing);
        let err = task.run().unwrap_err();

        assert_eq!(err.task(), Some("styles-prod"));
        assert!(matches!(err, TaskError::Failed { .. }));
    }

    #[test]
    fn continue_on_error_swallows_failure() {
        let task = Task::new("styles-dev", failing).continue_on_error(true);
        assert!(task.run().is_ok());
    }

    #[test]
    fn panic_is_caught_even_with_continue_on_error() {
        let task = Task::new("broken", || panic!("kaboom")).continue_on_error(true);

        match task.run() {
            Err(TaskError::Panicked { task, message }) => {
                assert_eq!(task, "broken");
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn runs_exactly_once_per_invocation() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = Task::new("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        task.run().unwrap();
        task.run().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_task_never_overlaps() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let task = {
            let active = active.clone();
            let peak = peak.clone();
            Task::new("slow", move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .into_arc()
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let task = task.clone();
                std::thread::spawn(move || task.run())
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
