//! The task-orchestration engine.
//!
//! A [`Task`] is a named side-effecting action. Tasks are composed into a
//! [`TaskGraph`] with two combinators, [`TaskGraph::sequence`] and
//! [`TaskGraph::parallel`], and executed by [`run`].
//!
//! Ordering lives entirely in the graph: nothing in a task knows what runs
//! before or after it, which keeps each pipeline declarative and lets the
//! same task be reused by the watch loop.

mod graph;
pub mod runner;
mod task;

pub use graph::TaskGraph;
pub use runner::run;
pub use task::Task;
