//! Dead-code elimination
//!
//! Removes every node and initializer that is not on a forward data-flow path
//! to a declared graph output.
//!
//! The search walks forward from graph inputs, initializers and source nodes,
//! carrying the path of tensors it came through. A path that hits a graph
//! output marks all of its tensors as in-graph. A path reaching a tensor that
//! was already expanded is parked; once the forward walk is done, parked paths
//! whose terminal tensor turned out to be in-graph are marked too, repeating
//! until nothing changes.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::graph::GraphContext;
use crate::proto::NodeProto;

/// Statistics from a cleanup run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    /// Number of nodes removed
    pub nodes_removed: usize,
    /// Number of initializers removed
    pub initializers_removed: usize,
}

impl CleanupStats {
    /// True when nothing was removed
    pub fn is_empty(&self) -> bool {
        self.nodes_removed == 0 && self.initializers_removed == 0
    }
}

/// One tensor on a search path; paths share prefixes through `parent`
struct PathLink<'g> {
    tensor: &'g str,
    parent: Option<usize>,
    marked: bool,
}

struct Reachability<'g> {
    links: Vec<PathLink<'g>>,
    in_graph: FxHashSet<&'g str>,
}

impl<'g> Reachability<'g> {
    fn push(&mut self, tensor: &'g str, parent: Option<usize>) -> usize {
        self.links.push(PathLink {
            tensor,
            parent,
            marked: false,
        });
        self.links.len() - 1
    }

    /// Mark every tensor on the path ending at `link`
    fn mark_path(&mut self, link: usize) {
        let mut current = Some(link);
        while let Some(index) = current {
            let entry = &mut self.links[index];
            if entry.marked {
                break;
            }
            entry.marked = true;
            self.in_graph.insert(entry.tensor);
            current = entry.parent;
        }
    }
}

/// Collect the names of all tensors on a path to some graph output
pub fn reachable_tensors(ctx: &GraphContext) -> FxHashSet<&str> {
    let mut consumers: FxHashMap<&str, SmallVec<[&NodeProto; 4]>> = FxHashMap::default();
    for node in ctx.nodes() {
        for input in node.input.iter().filter(|i| !i.is_empty()) {
            let entry = consumers.entry(input.as_str()).or_default();
            if !entry.iter().any(|n| std::ptr::eq(*n, node)) {
                entry.push(node);
            }
        }
    }

    let mut state = Reachability {
        links: Vec::new(),
        in_graph: FxHashSet::default(),
    };
    let mut frontier: Vec<usize> = Vec::new();

    for name in ctx.graph_input_map.keys() {
        frontier.push(state.push(name, None));
    }
    for init in ctx.initializers() {
        frontier.push(state.push(&init.name, None));
    }
    for name in ctx.sparse_initializer_names() {
        frontier.push(state.push(name, None));
    }
    for node in ctx.nodes() {
        if node.input.iter().all(|i| i.is_empty()) {
            for output in node.output.iter().filter(|o| !o.is_empty()) {
                frontier.push(state.push(output, None));
            }
        }
    }

    let mut visited: FxHashSet<&str> = FxHashSet::default();
    let mut deferred: Vec<usize> = Vec::new();

    while let Some(link) = frontier.pop() {
        let tensor = state.links[link].tensor;
        if !visited.insert(tensor) {
            deferred.push(link);
            continue;
        }

        if ctx.is_graph_output(tensor) {
            state.mark_path(link);
        }

        let Some(readers) = consumers.get(tensor) else {
            continue;
        };
        for node in readers {
            let mut parent = link;
            for input in node.input.iter().filter(|i| !i.is_empty() && *i != tensor) {
                parent = state.push(input, Some(parent));
            }
            for output in node.output.iter().filter(|o| !o.is_empty()) {
                frontier.push(state.push(output, Some(parent)));
            }
        }
    }

    // Back-patch paths that merged into an already expanded tensor
    loop {
        let mut changed = false;
        for &link in &deferred {
            let entry = &state.links[link];
            if !entry.marked && state.in_graph.contains(entry.tensor) {
                state.mark_path(link);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    state.in_graph
}

/// Remove nodes and initializers that do not reach any graph output
pub fn cleanup(ctx: &mut GraphContext) -> CleanupStats {
    let in_graph: FxHashSet<String> = reachable_tensors(ctx)
        .into_iter()
        .map(str::to_string)
        .collect();

    let nodes_removed =
        ctx.retain_nodes(|_, node| node.output.iter().any(|o| in_graph.contains(o)));
    let initializers_removed = ctx.retain_initializers(|t| in_graph.contains(&t.name));

    let stats = CleanupStats {
        nodes_removed,
        initializers_removed,
    };
    tracing::debug!(
        nodes_removed = stats.nodes_removed,
        initializers_removed = stats.initializers_removed,
        "dead-code cleanup finished"
    );
    stats
}
