//! Graph manipulation module for ONNX models
//!
//! This module provides the core infrastructure for working with ONNX graphs:
//!
//! - [`GraphContext`]: node arena plus initializers and graph interface
//! - [`maps`]: node handles and lookup tables
//!
//! # Example
//!
//! ```ignore
//! use onnx_rewrite::graph::GraphContext;
//!
//! let ctx = GraphContext::new(&graph);
//!
//! // Traverse graph
//! let producer = ctx.producer_of("conv_out");
//! let consumers = ctx.consumers_of("conv_out");
//!
//! // Constants are looked up separately
//! let consts = ctx.constants_producing("scale");
//! ```
//!
//! # Node handles
//!
//! Every node is addressed by a [`NodeId`] that stays valid while other
//! nodes are removed or inserted. Node order is kept in the arena and only
//! decides where replacement nodes are spliced in.

pub mod accessors;
pub mod context;
pub mod maps;
pub mod mutators;

// Re-export main types
pub use context::GraphContext;
pub use maps::{ConsumerMap, NodeArena, NodeId, ValueInfoMap};
