use std::sync::mpsc::channel;
use std::thread;
use std::time::Instant;

use tracing::{Level, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::engine::TaskGraph;
use crate::error::TaskError;
use crate::utils::{STYLE_PIPELINE, as_overhead};

/// Execute a task graph to completion or to its first failure.
///
/// The graph is walked depth-first. `Sequence` steps run one after another and
/// a failing step stops the sequence before later steps start. `Parallel`
/// members are each started on their own thread and rejoined through a channel
/// barrier; the first failure that arrives is returned straight away, without
/// waiting for the remaining members. Members that are already running are
/// not interrupted, they simply finish on their own.
pub fn run(graph: &TaskGraph) -> Result<(), TaskError> {
    let total = graph.len() as u64;

    if total == 0 {
        return Ok(());
    }

    let root = tracing::span!(Level::INFO, "pipeline");
    root.pb_set_length(total);
    root.pb_set_style(&STYLE_PIPELINE);
    root.pb_set_message("Running tasks...");
    let _enter = root.enter();

    let s = Instant::now();
    execute(graph, &root)?;

    tracing::info!("all {total} tasks finished {}", as_overhead(s));
    Ok(())
}

fn execute(graph: &TaskGraph, root: &Span) -> Result<(), TaskError> {
    match graph {
        TaskGraph::Task(task) => {
            task.run()?;
            root.pb_inc(1);
            Ok(())
        }
        TaskGraph::Sequence(steps) => {
            for step in steps {
                execute(step, root)?;
            }
            Ok(())
        }
        TaskGraph::Parallel(members) => execute_parallel(members, root),
    }
}

fn execute_parallel(members: &[TaskGraph], root: &Span) -> Result<(), TaskError> {
    let (sender, receiver) = channel::<Result<(), TaskError>>();

    for (i, member) in members.iter().enumerate() {
        let member = member.clone();
        let sender = sender.clone();
        let root = root.clone();

        let name = member
            .task_names()
            .first()
            .map_or_else(|| format!("parallel-{i}"), |name| name.to_string());

        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _enter = root.enter();
                let result = execute(&member, &root);
                // The receiver is gone once a sibling failed; nobody is
                // waiting for this result any more.
                let _ = sender.send(result);
            })
            .map_err(TaskError::Spawn)?;
    }

    drop(sender);

    for _ in members {
        receiver.recv()??;
    }

    Ok(())
}
