//! Graph mutation operations
//!
//! Methods for modifying the graph structure: adding, removing, and renaming.

use crate::proto::{NodeProto, TensorProto};

use super::context::GraphContext;
use super::maps::NodeId;

impl GraphContext {
    // ========================================================================
    // Node mutation
    // ========================================================================

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a node at the end of the node sequence
    pub fn add_node(&mut self, node: NodeProto) -> NodeId {
        let id = self.allocate_id();
        self.nodes.insert(id, node);
        id
    }

    /// Insert a node at `index` in the node sequence (clamped to the end)
    pub fn insert_node_at(&mut self, index: usize, node: NodeProto) -> NodeId {
        let id = self.allocate_id();
        let index = index.min(self.nodes.len());
        self.nodes.shift_insert(index, id, node);
        id
    }

    /// Put a previously removed node back under its old handle
    pub(crate) fn restore_node_at(&mut self, index: usize, id: NodeId, node: NodeProto) {
        let index = index.min(self.nodes.len());
        self.nodes.shift_insert(index, id, node);
    }

    /// Remove a node, keeping the order of the others
    pub fn remove_node(&mut self, id: NodeId) -> Option<NodeProto> {
        self.nodes.shift_remove(&id)
    }

    /// Keep only nodes for which `keep` returns true
    pub fn retain_nodes<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(NodeId, &NodeProto) -> bool,
    {
        let before = self.nodes.len();
        self.nodes.retain(|&id, node| keep(id, node));
        before - self.nodes.len()
    }

    // ========================================================================
    // Tensor renaming
    // ========================================================================

    /// Rename an output of one node, returning whether anything changed
    pub fn rename_node_output(&mut self, id: NodeId, from: &str, to: &str) -> bool {
        self.nodes
            .get_mut(&id)
            .map(|n| n.rename_output(from, to) > 0)
            .unwrap_or(false)
    }

    /// Point every reader of `from` at `to`, returning the number of edges moved
    pub fn redirect_consumers(&mut self, from: &str, to: &str) -> usize {
        self.nodes
            .values_mut()
            .map(|n| n.rename_input(from, to))
            .sum()
    }

    // ========================================================================
    // Initializer mutation
    // ========================================================================

    /// Append an initializer (no de-duplication)
    pub fn add_initializer(&mut self, tensor: TensorProto) {
        self.initializers.push(tensor);
    }

    /// Remove every initializer named `name`, returning how many were removed
    pub fn remove_initializers_named(&mut self, name: &str) -> usize {
        self.retain_initializers(|t| t.name != name)
    }

    /// Keep only initializers for which `keep` returns true
    pub fn retain_initializers<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&TensorProto) -> bool,
    {
        let before = self.initializers.len();
        self.initializers.retain(keep);
        before - self.initializers.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::GraphContext;
    use crate::proto::extensions::{make_node, make_tensor};
    use crate::proto::GraphProto;

    fn make_test_graph() -> GraphProto {
        GraphProto {
            node: vec![
                make_node("Conv", &["X", "W"], &["conv_out"], "conv_0"),
                make_node("Relu", &["conv_out"], &["Y"], "relu_0"),
            ],
            initializer: vec![make_tensor("W", &[1], &[1.0]), make_tensor("W", &[1], &[2.0])],
            ..Default::default()
        }
    }

    fn op_types(ctx: &GraphContext) -> Vec<&str> {
        ctx.nodes().map(|n| n.op_type.as_str()).collect()
    }

    #[test]
    fn test_insert_node_at() {
        let mut ctx = GraphContext::new(&make_test_graph());

        let id = ctx.insert_node_at(1, make_node("Sigmoid", &["conv_out"], &["s"], "sig_0"));
        assert_eq!(op_types(&ctx), vec!["Conv", "Sigmoid", "Relu"]);
        assert_eq!(ctx.position_of(id), Some(1));

        ctx.insert_node_at(99, make_node("Identity", &["Y"], &["Z"], "id_0"));
        assert_eq!(op_types(&ctx), vec!["Conv", "Sigmoid", "Relu", "Identity"]);
    }

    #[test]
    fn test_remove_node_keeps_handles_stable() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let conv = ctx.find_node_by_name("conv_0").unwrap();
        let relu = ctx.find_node_by_name("relu_0").unwrap();

        let removed = ctx.remove_node(conv).unwrap();
        assert_eq!(removed.op_type, "Conv");
        assert!(!ctx.has_node(conv));
        assert_eq!(ctx.node(relu).unwrap().name, "relu_0");
        assert_eq!(ctx.position_of(relu), Some(0));
        assert!(ctx.remove_node(conv).is_none());

        // Fresh handles never collide with removed ones
        let fresh = ctx.add_node(make_node("Conv", &["X"], &["c"], "conv_1"));
        assert_ne!(fresh, conv);
    }

    #[test]
    fn test_restore_node_reuses_handle() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let conv = ctx.find_node_by_name("conv_0").unwrap();

        let node = ctx.remove_node(conv).unwrap();
        ctx.restore_node_at(0, conv, node);
        assert_eq!(ctx.position_of(conv), Some(0));
    }

    #[test]
    fn test_rename_and_redirect() {
        let mut ctx = GraphContext::new(&make_test_graph());
        let conv = ctx.find_node_by_name("conv_0").unwrap();

        assert!(ctx.rename_node_output(conv, "conv_out", "renamed"));
        assert!(!ctx.rename_node_output(conv, "conv_out", "again"));
        assert_eq!(ctx.redirect_consumers("conv_out", "renamed"), 1);
        assert_eq!(ctx.consumers_of("renamed").len(), 1);
    }

    #[test]
    fn test_initializer_mutation() {
        let mut ctx = GraphContext::new(&make_test_graph());

        ctx.add_initializer(make_tensor("B", &[1], &[0.0]));
        assert_eq!(ctx.initializers().len(), 3);
        assert_eq!(ctx.remove_initializers_named("W"), 2);
        assert_eq!(ctx.initializers().len(), 1);
    }
}
