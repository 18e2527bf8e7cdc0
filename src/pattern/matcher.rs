//! Pattern matching engine for ONNX graphs
//!
//! Every non-constant node is tried as the anchor of a chain. From the anchor
//! the matcher walks forward along consumer edges with a depth-first search,
//! checking op types and variable bindings at each step. The first chain that
//! satisfies all steps is reported for that anchor.

use std::fmt;

use smallvec::{smallvec, SmallVec};

use crate::graph::maps::build_consumer_map;
use crate::graph::{ConsumerMap, GraphContext, NodeId};
use crate::proto::NodeProto;

use super::parser::{BindSpec, Pattern, PatternStep};

/// Default cap on search states popped per anchor
pub const DEFAULT_MAX_SEARCH_STATES: usize = 100_000;

/// Matched nodes in pattern step order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedChain {
    nodes: SmallVec<[NodeId; 6]>,
}

impl MatchedChain {
    /// Build a chain from handles in step order
    pub fn from_ids<I: IntoIterator<Item = NodeId>>(ids: I) -> Self {
        Self {
            nodes: ids.into_iter().collect(),
        }
    }

    /// Node handles in step order
    pub fn ids(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The anchor (first step) node
    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// The node matched by the last step
    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Node at step `index`
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    /// Number of matched nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if the chain contains `id`
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// `name(op_type), ...` listing of the chain
    pub fn describe(&self, ctx: &GraphContext) -> String {
        self.nodes
            .iter()
            .map(|&id| ctx.label(id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a MatchedChain {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Variable bindings: one slot per pattern variable
type Bindings<'g> = SmallVec<[Option<&'g str>; 8]>;

/// Partial match on the search stack
struct SearchState<'g> {
    chain: SmallVec<[NodeId; 6]>,
    step: usize,
    bindings: Bindings<'g>,
}

/// Pattern matcher over a graph snapshot
pub struct PatternMatcher<'a> {
    ctx: &'a GraphContext,
    consumers: ConsumerMap,
    max_states: usize,
}

impl<'a> PatternMatcher<'a> {
    /// Create a new pattern matcher
    pub fn new(ctx: &'a GraphContext) -> Self {
        Self {
            ctx,
            consumers: build_consumer_map(&ctx.nodes),
            max_states: DEFAULT_MAX_SEARCH_STATES,
        }
    }

    /// Limit the number of search states explored per anchor
    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states.max(1);
        self
    }

    /// Find the first chain matching `pattern` that starts at `anchor`
    pub fn match_at(&self, anchor: NodeId, pattern: &Pattern) -> Option<MatchedChain> {
        let steps = pattern.steps();
        if steps.is_empty() || self.ctx.node(anchor)?.is_constant() {
            return None;
        }

        let mut stack = vec![SearchState {
            chain: smallvec![anchor],
            step: 0,
            bindings: smallvec![None; pattern.variables().len()],
        }];
        let mut popped = 0usize;

        while let Some(state) = stack.pop() {
            popped += 1;
            if popped > self.max_states {
                tracing::debug!(
                    anchor = %self.ctx.label(anchor),
                    max_states = self.max_states,
                    "search state cap reached, giving up on anchor"
                );
                return None;
            }

            let Some(&id) = state.chain.last() else {
                continue;
            };
            let Some(node) = self.ctx.node(id) else {
                continue;
            };
            let step = &steps[state.step];

            if !step.op_types.accepts(&node.op_type)
                || !inputs_satisfied(step, node, &state.bindings)
            {
                continue;
            }

            if state.step + 1 == steps.len() {
                return Some(MatchedChain { nodes: state.chain });
            }

            let Some(bindings) = bind_outputs(step, node, state.bindings) else {
                continue;
            };

            // Pushed in reverse so the first output's first consumer is tried first
            for output in node.output.iter().rev() {
                let Some(consumers) = self.consumers.get(output) else {
                    continue;
                };
                for &consumer in consumers.iter().rev() {
                    let mut chain = state.chain.clone();
                    chain.push(consumer);
                    stack.push(SearchState {
                        chain,
                        step: state.step + 1,
                        bindings: bindings.clone(),
                    });
                }
            }
        }

        None
    }

    /// Find all matches of a pattern in the graph, in anchor order
    pub fn find_all(&self, pattern: &Pattern) -> Vec<MatchedChain> {
        self.ctx
            .iter_nodes()
            .filter(|(_, node)| !node.is_constant())
            .filter_map(|(id, _)| self.match_at(id, pattern))
            .collect()
    }
}

/// Every named input spec must resolve to a tensor the node reads
fn inputs_satisfied(step: &PatternStep, node: &NodeProto, bindings: &Bindings<'_>) -> bool {
    step.inputs.iter().all(|spec| match *spec {
        BindSpec::Any => true,
        BindSpec::Var(var) => match bindings.get(var).copied().flatten() {
            Some(tensor) => node.input.iter().any(|i| i == tensor),
            None => false,
        },
    })
}

/// Bind output specs positionally; `None` when the node cannot satisfy them
fn bind_outputs<'g>(
    step: &PatternStep,
    node: &'g NodeProto,
    mut bindings: Bindings<'g>,
) -> Option<Bindings<'g>> {
    for (index, spec) in step.outputs.iter().enumerate() {
        let BindSpec::Var(var) = *spec else {
            continue;
        };
        let actual = node.output.get(index)?.as_str();
        let slot = bindings.get_mut(var)?;
        match *slot {
            Some(bound) if bound != actual => return None,
            _ => *slot = Some(actual),
        }
    }
    Some(bindings)
}

/// Find all matches of `pattern` in `ctx`
pub fn find_matches(ctx: &GraphContext, pattern: &Pattern) -> Vec<MatchedChain> {
    PatternMatcher::new(ctx).find_all(pattern)
}

/// Human-readable listing of matches followed by the pattern text
pub fn format_matches(ctx: &GraphContext, pattern: &Pattern, matches: &[MatchedChain]) -> String {
    MatchListing {
        ctx,
        pattern,
        matches,
    }
    .to_string()
}

struct MatchListing<'a> {
    ctx: &'a GraphContext,
    pattern: &'a Pattern,
    matches: &'a [MatchedChain],
}

impl fmt::Display for MatchListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(69);
        writeln!(f, "{rule}")?;
        writeln!(f, "Found {} subgraphs:", self.matches.len())?;
        for (i, chain) in self.matches.iter().enumerate() {
            writeln!(f, "\tSubgraph{i}: {}", chain.describe(self.ctx))?;
        }
        writeln!(f, "Pattern is:")?;
        for line in self.pattern.lines() {
            writeln!(f, "\t{line}")?;
        }
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_constant_node, make_node, make_tensor, make_value_info};
    use crate::proto::GraphProto;

    fn make_swish_graph() -> GraphProto {
        GraphProto {
            node: vec![
                make_node("Conv", &["X", "W0"], &["c0"], "conv_0"),
                make_node("Sigmoid", &["c0"], &["s0"], "sigmoid_0"),
                make_node("Mul", &["c0", "s0"], &["m0"], "mul_0"),
                make_node("Conv", &["m0", "W1"], &["Y"], "conv_1"),
            ],
            input: vec![make_value_info("X")],
            output: vec![make_value_info("Y")],
            initializer: vec![make_tensor("W0", &[1], &[1.0]), make_tensor("W1", &[1], &[1.0])],
            ..Default::default()
        }
    }

    fn names(ctx: &GraphContext, chain: &MatchedChain) -> Vec<String> {
        chain
            .ids()
            .iter()
            .map(|&id| ctx.node(id).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_sigmoid_mul_matches_once() {
        let ctx = GraphContext::new(&make_swish_graph());
        let pattern = Pattern::parse("Sigmoid(?, x0)\nMul(x0, ?)").unwrap();

        let matches = find_matches(&ctx, &pattern);
        assert_eq!(matches.len(), 1);
        assert_eq!(names(&ctx, &matches[0]), vec!["sigmoid_0", "mul_0"]);
    }

    #[test]
    fn test_list_containment_is_order_independent() {
        let ctx = GraphContext::new(&make_swish_graph());
        // mul_0 reads [c0, s0]; the list names them reversed
        let pattern = Pattern::parse("Conv(?, c0)\nSigmoid(c0, s0)\nMul([s0, c0], ?)").unwrap();

        let matches = find_matches(&ctx, &pattern);
        assert_eq!(matches.len(), 1);
        assert_eq!(
            names(&ctx, &matches[0]),
            vec!["conv_0", "sigmoid_0", "mul_0"]
        );
    }

    #[test]
    fn test_binding_mismatch_rejects() {
        let ctx = GraphContext::new(&make_swish_graph());
        // Sigmoid's output must feed the final Conv directly, which it does not
        let pattern = Pattern::parse("Sigmoid(?, s)\nMul(?, ?)\nConv(s, ?)").unwrap();

        assert!(find_matches(&ctx, &pattern).is_empty());
    }

    #[test]
    fn test_backtracks_across_consumers() {
        // conv_0 feeds sigmoid_0 first; only the Mul branch continues to Conv
        let ctx = GraphContext::new(&make_swish_graph());
        let pattern = Pattern::parse("Conv(?, a)\n?(a, b)\nConv(b, ?)").unwrap();

        let matches = find_matches(&ctx, &pattern);
        assert_eq!(matches.len(), 1);
        assert_eq!(names(&ctx, &matches[0]), vec!["conv_0", "mul_0", "conv_1"]);
    }

    #[test]
    fn test_sibling_branches_do_not_share_bindings() {
        // Two consumers of t bind `u` differently; only the second branch's
        // binding is read by the final step.
        let graph = GraphProto {
            node: vec![
                make_node("Relu", &["X"], &["t"], "relu_0"),
                make_node("Neg", &["t"], &["u1"], "neg_0"),
                make_node("Neg", &["t"], &["u2"], "neg_1"),
                make_node("Exp", &["u2"], &["e"], "exp_0"),
            ],
            input: vec![make_value_info("X")],
            ..Default::default()
        };
        let ctx = GraphContext::new(&graph);
        let pattern = Pattern::parse("Relu(?, t)\nNeg(t, u)\nExp(u, ?)").unwrap();

        let matches = find_matches(&ctx, &pattern);
        assert_eq!(matches.len(), 1);
        assert_eq!(names(&ctx, &matches[0]), vec!["relu_0", "neg_1", "exp_0"]);
    }

    #[test]
    fn test_chain_must_be_data_connected() {
        // Both op types exist but are not adjacent
        let ctx = GraphContext::new(&make_swish_graph());
        let pattern = Pattern::parse("Sigmoid(?, ?)\nConv(?, ?)").unwrap();

        assert!(find_matches(&ctx, &pattern).is_empty());
    }

    #[test]
    fn test_constants_are_never_matched() {
        let graph = GraphProto {
            node: vec![
                make_constant_node("k", make_tensor("k", &[1], &[2.0]), "const_0"),
                make_node("Mul", &["X", "k"], &["Y"], "mul_0"),
            ],
            input: vec![make_value_info("X")],
            output: vec![make_value_info("Y")],
            ..Default::default()
        };
        let ctx = GraphContext::new(&graph);

        let single = Pattern::parse("?(?, ?)").unwrap();
        let matches = find_matches(&ctx, &single);
        assert_eq!(matches.len(), 1);
        assert_eq!(names(&ctx, &matches[0]), vec!["mul_0"]);

        let pair = Pattern::parse("?(?, ?)\n?(?, ?)").unwrap();
        assert!(find_matches(&ctx, &pair).is_empty());
    }

    #[test]
    fn test_wildcard_pattern_one_chain_per_anchor() {
        // Strict chain of four nodes: a two-step wildcard pattern matches at
        // the first three anchors.
        let graph = GraphProto {
            node: vec![
                make_node("A", &["X"], &["a"], "a"),
                make_node("B", &["a"], &["b"], "b"),
                make_node("C", &["b"], &["c"], "c"),
                make_node("D", &["c"], &["Y"], "d"),
            ],
            ..Default::default()
        };
        let ctx = GraphContext::new(&graph);
        let pattern = Pattern::parse("?(?, ?)\n?(?, ?)").unwrap();

        let matches = find_matches(&ctx, &pattern);
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| m.len() == 2));
        assert_eq!(names(&ctx, &matches[0]), vec!["a", "b"]);
        assert_eq!(names(&ctx, &matches[2]), vec!["c", "d"]);
    }

    #[test]
    fn test_output_spec_beyond_outputs_rejects() {
        let ctx = GraphContext::new(&make_swish_graph());
        let pattern = Pattern::parse("Sigmoid(?, [a, b])\nMul(a, ?)").unwrap();

        assert!(find_matches(&ctx, &pattern).is_empty());
    }

    #[test]
    fn test_search_state_cap() {
        let ctx = GraphContext::new(&make_swish_graph());
        let pattern = Pattern::parse("Conv(?, a)\n?(a, b)\nConv(b, ?)").unwrap();

        let capped = PatternMatcher::new(&ctx).with_max_states(2);
        assert!(capped.find_all(&pattern).is_empty());
    }

    #[test]
    fn test_format_matches() {
        let ctx = GraphContext::new(&make_swish_graph());
        let pattern = Pattern::parse("Sigmoid(?, x0)\nMul(x0, ?)").unwrap();
        let matches = find_matches(&ctx, &pattern);

        let report = format_matches(&ctx, &pattern, &matches);
        assert!(report.contains("Found 1 subgraphs:"));
        assert!(report.contains("Subgraph0: sigmoid_0(Sigmoid), mul_0(Mul)"));
        assert!(report.contains("\tSigmoid(?,x0)\n\tMul(x0,?)"));
    }
}
