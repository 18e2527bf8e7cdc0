//! Graph map types and builders
//!
//! Defines the node handle and the lookup tables built over a graph.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};
use smallvec::SmallVec;

use crate::proto::{NodeProto, ValueInfoProto};

/// Stable handle of a node inside a [`GraphContext`](super::GraphContext)
///
/// Handles are never reused, so removing or inserting other nodes does not
/// invalidate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw handle value
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node arena: handle → node, iteration order = node sequence order
pub type NodeArena = IndexMap<NodeId, NodeProto, FxBuildHasher>;

/// Type alias for value info map: name → ValueInfoProto (order preserved)
pub type ValueInfoMap = IndexMap<String, ValueInfoProto, FxBuildHasher>;

/// Type alias for consumer map: tensor_name → consumer handles
/// SmallVec optimized for common case of 1-4 consumers
pub type ConsumerMap = FxHashMap<String, SmallVec<[NodeId; 4]>>;

/// Build consumer map from the arena, skipping constant nodes
///
/// Consumers are listed in node sequence order.
pub fn build_consumer_map(nodes: &NodeArena) -> ConsumerMap {
    let mut map: ConsumerMap = FxHashMap::default();

    for (&id, node) in nodes.iter().filter(|(_, n)| !n.is_constant()) {
        for input in &node.input {
            if input.is_empty() {
                continue;
            }
            let consumers = map.entry(input.clone()).or_default();
            // A node reading the same tensor twice is still one consumer
            if consumers.last() != Some(&id) {
                consumers.push(id);
            }
        }
    }

    map
}

/// Build value info map from a list, keeping the first entry per name
pub fn build_value_info_map(infos: &[ValueInfoProto]) -> ValueInfoMap {
    let mut map = ValueInfoMap::default();
    for vi in infos {
        map.entry(vi.name.clone()).or_insert_with(|| vi.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_constant_node, make_node, make_tensor};

    fn make_test_arena() -> NodeArena {
        let mut arena = NodeArena::default();
        arena.insert(NodeId(0), make_node("Conv", &["X", "W"], &["conv_out"], "conv_0"));
        arena.insert(
            NodeId(1),
            make_constant_node("k", make_tensor("k", &[1], &[0.5]), "const_0"),
        );
        arena.insert(NodeId(2), make_node("Mul", &["conv_out", "k"], &["mul_out"], "mul_0"));
        arena.insert(
            NodeId(3),
            make_node("Add", &["conv_out", "conv_out"], &["Y"], "add_0"),
        );
        arena
    }

    #[test]
    fn test_build_consumer_map() {
        let arena = make_test_arena();
        let map = build_consumer_map(&arena);

        assert_eq!(
            map.get("conv_out").map(|v| v.as_slice()),
            Some(&[NodeId(2), NodeId(3)][..])
        );
        assert_eq!(map.get("k").map(|v| v.as_slice()), Some(&[NodeId(2)][..]));
        assert!(map.get("Y").is_none());
    }

    #[test]
    fn test_build_value_info_map_keeps_first() {
        let infos = vec![
            ValueInfoProto {
                name: "X".to_string(),
                doc_string: "first".to_string(),
                ..Default::default()
            },
            ValueInfoProto {
                name: "X".to_string(),
                doc_string: "second".to_string(),
                ..Default::default()
            },
        ];
        let map = build_value_info_map(&infos);
        assert_eq!(map.len(), 1);
        assert_eq!(map["X"].doc_string, "first");
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(7).to_string(), "#7");
        assert_eq!(NodeId(7).index(), 7);
    }
}
