//! Model builder module
//!
//! This module turns a rewritten `GraphContext` back into a model:
//!
//! - [`ModelBuilder`]: Fluent builder for assembling models
//! - [`cleanup`]: Dead-code elimination
//!
//! # Example
//!
//! ```ignore
//! use onnx_rewrite::builder::{cleanup, ModelBuilder};
//!
//! let stats = cleanup::cleanup(&mut ctx);
//! println!("Removed {} nodes", stats.nodes_removed);
//!
//! let (model, _) = ModelBuilder::new(original_model)
//!     .producer_name("onnx-rewrite")
//!     .build(ctx);
//! ```

pub mod cleanup;
pub mod model;

// Re-export main types and functions
pub use cleanup::{reachable_tensors, CleanupStats};
pub use model::{build_model, ModelBuilder};
