use std::fmt::{Display, Write};
use std::sync::Arc;

use super::Task;

/// A declarative composition of tasks.
///
/// * `Sequence` runs its steps in order, each one starting only after the
///   previous one completed successfully.
/// * `Parallel` starts all of its members at once and completes only when
///   every member completed.
///
/// Graphs are cheap to clone, tasks are shared through `Arc`.
#[derive(Debug, Clone)]
pub enum TaskGraph {
    Task(Arc<Task>),
    Sequence(Vec<TaskGraph>),
    Parallel(Vec<TaskGraph>),
}

impl TaskGraph {
    pub fn task(task: &Arc<Task>) -> Self {
        TaskGraph::Task(task.clone())
    }

    pub fn sequence(steps: impl IntoIterator<Item = TaskGraph>) -> Self {
        TaskGraph::Sequence(steps.into_iter().collect())
    }

    pub fn parallel(members: impl IntoIterator<Item = TaskGraph>) -> Self {
        TaskGraph::Parallel(members.into_iter().collect())
    }

    /// Number of task nodes in the graph.
    pub fn len(&self) -> usize {
        match self {
            TaskGraph::Task(_) => 1,
            TaskGraph::Sequence(nodes) | TaskGraph::Parallel(nodes) => {
                nodes.iter().map(TaskGraph::len).sum()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Task names in declaration order.
    pub fn task_names(&self) -> Vec<&str> {
        let mut acc = Vec::new();
        self.collect_names(&mut acc);
        acc
    }

    fn collect_names<'a>(&'a self, acc: &mut Vec<&'a str>) {
        match self {
            TaskGraph::Task(task) => acc.push(task.name()),
            TaskGraph::Sequence(nodes) | TaskGraph::Parallel(nodes) => {
                for node in nodes {
                    node.collect_names(acc);
                }
            }
        }
    }
}

impl From<Arc<Task>> for TaskGraph {
    fn from(task: Arc<Task>) -> Self {
        TaskGraph::Task(task)
    }
}

/// Renders the graph as a Mermaid flowchart. Sequential edges are drawn
/// between consecutive steps, parallel members fan out and back in.
impl Display for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        let mut next = 0;

        writeln!(out, "graph LR")?;
        render(self, &mut out, &mut next)?;

        f.write_str(&out)
    }
}

/// Writes nodes for `graph` and returns its entry and exit node ids.
fn render(
    graph: &TaskGraph,
    out: &mut String,
    next: &mut usize,
) -> Result<Option<(Vec<usize>, Vec<usize>)>, std::fmt::Error> {
    match graph {
        TaskGraph::Task(task) => {
            let id = *next;
            *next += 1;
            let name = task.name().replace('"', "\\\"");
            writeln!(out, "    {id}[\"{name}\"]")?;
            Ok(Some((vec![id], vec![id])))
        }
        TaskGraph::Sequence(steps) => {
            let mut entry: Option<Vec<usize>> = None;
            let mut exit: Option<Vec<usize>> = None;

            for step in steps {
                let Some((step_in, step_out)) = render(step, out, next)? else {
                    continue;
                };

                if let Some(prev) = &exit {
                    for a in prev {
                        for b in &step_in {
                            writeln!(out, "    {a} --> {b}")?;
                        }
                    }
                }

                entry.get_or_insert(step_in);
                exit = Some(step_out);
            }

            Ok(entry.zip(exit))
        }
        TaskGraph::Parallel(members) => {
            let mut entry = Vec::new();
            let mut exit = Vec::new();

            for member in members {
                if let Some((member_in, member_out)) = render(member, out, next)? {
                    entry.extend(member_in);
                    exit.extend(member_out);
                }
            }

            if entry.is_empty() {
                Ok(None)
            } else {
                Ok(Some((entry, exit)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> TaskGraph {
        Task::new(name, || Ok(())).into_arc().into()
    }

    #[test]
    fn test_task_names_in_order() {
        let graph = TaskGraph::sequence([
            noop("a"),
            TaskGraph::parallel([noop("b"), noop("c")]),
            noop("d"),
        ]);

        assert_eq!(graph.task_names(), vec!["a", "b", "c", "d"]);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_empty_groups() {
        let graph = TaskGraph::sequence([TaskGraph::parallel([])]);
        assert!(graph.is_empty());
        assert_eq!(graph.to_string(), "graph LR\n");
    }

    #[test]
    fn test_mermaid_fan_out_fan_in() {
        let graph = TaskGraph::sequence([
            noop("clean"),
            TaskGraph::parallel([noop("styles"), noop("scripts")]),
            noop("watch"),
        ]);

        let expected = "graph LR
    0[\"clean\"]
    1[\"styles\"]
    2[\"scripts\"]
    0 --> 1
    0 --> 2
    3[\"watch\"]
    1 --> 3
    2 --> 3
";
        assert_eq!(graph.to_string(), expected);
    }
}
