//! Graph context for ONNX model manipulation
//!
//! `GraphContext` is the central structure for working with ONNX graphs.
//! Nodes live in an arena keyed by [`NodeId`], so rewrites remove and insert
//! by handle instead of by list position.

use crate::error::{OnnxResult, TransformError};
use crate::proto::{GraphProto, ModelProto, NodeProto, TensorProto, ValueInfoProto};

use super::maps::{build_value_info_map, NodeArena, NodeId, ValueInfoMap};

/// Graph context for efficient graph operations
#[derive(Debug, Clone, Default)]
pub struct GraphContext {
    /// Node arena (preserves node sequence order)
    pub(crate) nodes: NodeArena,

    /// Next handle to hand out
    pub(crate) next_id: u32,

    /// Initializers in declaration order (duplicates allowed)
    pub(crate) initializers: Vec<TensorProto>,

    /// Maps graph input name → ValueInfoProto
    pub graph_input_map: ValueInfoMap,

    /// Maps graph output name → ValueInfoProto
    pub graph_output_map: ValueInfoMap,

    /// Intermediate value_info, carried through unchanged
    pub value_info: Vec<ValueInfoProto>,

    /// Graph name
    pub name: String,

    /// Graph-level fields passed through untouched: doc string, sparse
    /// initializers, quantization annotations and metadata
    pub(crate) carried: GraphProto,
}

impl GraphContext {
    /// Create a new GraphContext from a GraphProto
    pub fn new(graph: &GraphProto) -> Self {
        let mut ctx = Self {
            initializers: graph.initializer.clone(),
            graph_input_map: build_value_info_map(&graph.input),
            graph_output_map: build_value_info_map(&graph.output),
            value_info: graph.value_info.clone(),
            name: graph.name.clone(),
            carried: GraphProto {
                doc_string: graph.doc_string.clone(),
                sparse_initializer: graph.sparse_initializer.clone(),
                quantization_annotation: graph.quantization_annotation.clone(),
                metadata_props: graph.metadata_props.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        for node in &graph.node {
            ctx.add_node(node.clone());
        }
        ctx
    }

    /// Create from a ModelProto
    pub fn from_model(model: &ModelProto) -> OnnxResult<Self> {
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| TransformError::MissingField("model.graph".to_string()))?;

        Ok(Self::new(graph))
    }

    // ========================================================================
    // Node accessors
    // ========================================================================

    /// Get a node by handle
    pub fn node(&self, id: NodeId) -> Option<&NodeProto> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by handle
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeProto> {
        self.nodes.get_mut(&id)
    }

    /// Get a node by handle or fail with `NodeNotFound`
    pub fn require_node(&self, id: NodeId) -> OnnxResult<&NodeProto> {
        self.node(id)
            .ok_or_else(|| TransformError::NodeNotFound(id.to_string()))
    }

    /// Check if a node exists
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Position of a node in the node sequence
    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&id)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all nodes in order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeProto> {
        self.nodes.values()
    }

    /// Iterate over node handles in order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Iterate over `(handle, node)` pairs in order
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeProto)> {
        self.nodes.iter().map(|(&id, node)| (id, node))
    }

    /// Look up the first node with the given name
    ///
    /// Node names are diagnostic only and need not be unique.
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter_nodes()
            .find(|(_, n)| n.name == name)
            .map(|(id, _)| id)
    }

    /// `name(op_type)` label of a node, or its handle if it is gone
    pub fn label(&self, id: NodeId) -> String {
        self.node(id)
            .map(NodeProto::label)
            .unwrap_or_else(|| id.to_string())
    }

    // ========================================================================
    // Graph interface
    // ========================================================================

    /// Initializers in declaration order
    pub fn initializers(&self) -> &[TensorProto] {
        &self.initializers
    }

    /// Check if a tensor is a graph input
    pub fn is_graph_input(&self, name: &str) -> bool {
        self.graph_input_map.contains_key(name)
    }

    /// Check if a tensor is a graph output
    pub fn is_graph_output(&self, name: &str) -> bool {
        self.graph_output_map.contains_key(name)
    }

    /// Check if a tensor is an initializer
    pub fn is_initializer(&self, name: &str) -> bool {
        self.initializers.iter().any(|t| t.name == name)
    }

    /// Names of the sparse initializers, which are carried through as is
    pub fn sparse_initializer_names(&self) -> impl Iterator<Item = &str> {
        self.carried
            .sparse_initializer
            .iter()
            .filter_map(|sparse| sparse.values.as_ref())
            .map(|values| values.name.as_str())
    }

    // ========================================================================
    // Rebuilding
    // ========================================================================

    /// Build a GraphProto reflecting the current state
    pub fn build_graph(&self) -> GraphProto {
        GraphProto {
            node: self.nodes.values().cloned().collect(),
            name: self.name.clone(),
            initializer: self.initializers.clone(),
            input: self.graph_input_map.values().cloned().collect(),
            output: self.graph_output_map.values().cloned().collect(),
            value_info: self.value_info.clone(),
            ..self.carried.clone()
        }
    }

    /// Build a model from `original` with its graph replaced
    pub fn build_model(&self, original: &ModelProto) -> ModelProto {
        let mut model = original.clone();
        model.graph = Some(self.build_graph());
        model
    }
}
