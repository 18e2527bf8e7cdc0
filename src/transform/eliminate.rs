//! Private constant elimination
//!
//! When a matched node is dropped, the constant nodes and initializers that
//! fed only that node go with it.

use rustc_hash::FxHashSet;

use crate::graph::GraphContext;
use crate::proto::NodeProto;

/// Result of removing the constants behind dropped nodes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EliminationStats {
    /// Constant nodes removed
    pub constants_removed: usize,
    /// Initializers removed
    pub initializers_removed: usize,
}

/// Remove the constant nodes and initializers feeding `dropped`
///
/// `dropped` must already be out of the graph. With `protect_shared` set, a
/// tensor that some node in the graph still reads (or that is a graph
/// output) is left alone.
pub fn remove_private_constants<'n, I>(
    ctx: &mut GraphContext,
    dropped: I,
    protect_shared: bool,
) -> EliminationStats
where
    I: IntoIterator<Item = &'n NodeProto>,
{
    let mut stats = EliminationStats::default();
    let mut seen: FxHashSet<&str> = FxHashSet::default();

    for node in dropped {
        for input in node.input.iter().filter(|i| !i.is_empty()) {
            if !seen.insert(input.as_str()) {
                continue;
            }
            if protect_shared && is_shared(ctx, input) {
                if !ctx.constants_producing(input).is_empty() || ctx.is_initializer(input) {
                    tracing::debug!(tensor = %input, "keeping constant still in use");
                }
                continue;
            }

            for id in ctx.constants_producing(input) {
                if ctx.remove_node(id).is_some() {
                    stats.constants_removed += 1;
                }
            }
            stats.initializers_removed += ctx.remove_initializers_named(input);
        }
    }

    stats
}

fn is_shared(ctx: &GraphContext, tensor: &str) -> bool {
    ctx.reference_count(tensor) > 0 || ctx.is_graph_output(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_constant_node, make_node, make_tensor, make_value_info};
    use crate::proto::GraphProto;

    fn make_test_graph() -> GraphProto {
        GraphProto {
            node: vec![
                make_constant_node("k", make_tensor("k", &[1], &[2.0]), "const_k"),
                make_node("Mul", &["X", "k"], &["m"], "mul_0"),
                make_node("Add", &["m", "B"], &["a"], "add_0"),
                make_node("Sub", &["a", "B"], &["Y"], "sub_0"),
            ],
            input: vec![make_value_info("X")],
            output: vec![make_value_info("Y")],
            initializer: vec![make_tensor("B", &[1], &[1.0])],
            ..Default::default()
        }
    }

    fn take(ctx: &mut GraphContext, name: &str) -> NodeProto {
        let id = ctx.find_node_by_name(name).unwrap();
        ctx.remove_node(id).unwrap()
    }

    #[test]
    fn test_removes_private_constant_node() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let mul = take(&mut ctx, "mul_0");

        let stats = remove_private_constants(&mut ctx, [&mul], true);

        assert_eq!(stats.constants_removed, 1);
        assert_eq!(stats.initializers_removed, 0);
        assert!(ctx.find_node_by_name("const_k").is_none());
    }

    #[test]
    fn test_keeps_shared_initializer() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let add = take(&mut ctx, "add_0");

        let stats = remove_private_constants(&mut ctx, [&add], true);

        // `B` is still read by sub_0
        assert_eq!(stats, EliminationStats::default());
        assert!(ctx.is_initializer("B"));
    }

    #[test]
    fn test_unprotected_removal_drops_shared_initializer() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let add = take(&mut ctx, "add_0");

        let stats = remove_private_constants(&mut ctx, [&add], false);

        assert_eq!(stats.initializers_removed, 1);
        assert!(!ctx.is_initializer("B"));
    }

    #[test]
    fn test_initializer_freed_by_last_reader() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let add = take(&mut ctx, "add_0");
        let sub = take(&mut ctx, "sub_0");

        let stats = remove_private_constants(&mut ctx, [&add, &sub], true);

        assert_eq!(stats.initializers_removed, 1);
        assert!(ctx.initializers().is_empty());
    }
}
