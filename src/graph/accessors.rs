//! Graph lookup helpers
//!
//! Pure queries used by the matcher, the rewrite engine and cleanup. Constant
//! nodes are left out of [`producer_of`](GraphContext::producer_of) and
//! [`consumers_of`](GraphContext::consumers_of) so that pattern search never
//! walks through them.

use crate::proto::{NodeProto, TensorProto};

use super::context::GraphContext;
use super::maps::NodeId;

impl GraphContext {
    /// The non-constant node producing `tensor`, if any
    pub fn producer_of(&self, tensor: &str) -> Option<NodeId> {
        self.iter_nodes()
            .find(|(_, n)| !n.is_constant() && n.output.iter().any(|o| o == tensor))
            .map(|(id, _)| id)
    }

    /// All non-constant nodes reading `tensor`, in node sequence order
    pub fn consumers_of(&self, tensor: &str) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, n)| !n.is_constant() && n.input.iter().any(|i| i == tensor))
            .map(|(id, _)| id)
            .collect()
    }

    /// All constant nodes whose output is `tensor`
    pub fn constants_producing(&self, tensor: &str) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, n)| n.is_constant() && n.output.iter().any(|o| o == tensor))
            .map(|(id, _)| id)
            .collect()
    }

    /// All nodes, constant or not, whose outputs include `tensor`
    pub fn nodes_producing(&self, tensor: &str) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, n)| n.output.iter().any(|o| o == tensor))
            .map(|(id, _)| id)
            .collect()
    }

    /// All initializers named `tensor`
    pub fn initializers_named(&self, tensor: &str) -> Vec<&TensorProto> {
        self.initializers
            .iter()
            .filter(|t| t.name == tensor)
            .collect()
    }

    /// Find nodes by op type
    pub fn find_nodes_by_op(&self, op_type: &str) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, n)| n.op_type == op_type)
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of nodes (constant or not) reading `tensor`
    pub fn reference_count(&self, tensor: &str) -> usize {
        self.nodes()
            .filter(|n| n.input.iter().any(|i| i == tensor))
            .count()
    }

    /// Check if every input of `node` resolves to a graph input, an
    /// initializer or a node output
    pub fn inputs_resolved(&self, node: &NodeProto) -> bool {
        node.input
            .iter()
            .filter(|i| !i.is_empty())
            .all(|i| self.is_defined(i))
    }

    fn is_defined(&self, tensor: &str) -> bool {
        self.is_graph_input(tensor)
            || self.is_initializer(tensor)
            || self.sparse_initializer_names().any(|name| name == tensor)
            || self.nodes().any(|n| n.output.iter().any(|o| o == tensor))
    }

    /// Tensor names read by some node but never defined
    pub fn dangling_inputs(&self) -> Vec<&str> {
        let mut dangling: Vec<&str> = Vec::new();
        for node in self.nodes() {
            for input in node.input.iter().filter(|i| !i.is_empty()) {
                if !self.is_defined(input) && !dangling.contains(&input.as_str()) {
                    dangling.push(input.as_str());
                }
            }
        }
        dangling
    }
}
