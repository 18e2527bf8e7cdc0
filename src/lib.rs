//! # onnx-rewrite
//!
//! Pattern matching and subgraph rewriting for ONNX computation graphs.
//!
//! Patterns are written in a small line-oriented language, one node per line:
//!
//! ```text
//! Conv(?, c0)
//! Sigmoid(c0, s0)
//! Mul([s0, c0], ?)
//! ```
//!
//! ## Features
//!
//! - **Pattern Matching**: Find data-connected chains of nodes with variable bindings
//! - **Rewriting**: Delete matched chains (bridging the hole) or substitute new nodes
//! - **Graph Cleanup**: Remove nodes and initializers that reach no graph output
//!
//! ## Example
//!
//! ```ignore
//! use onnx_rewrite::prelude::*;
//!
//! let model = load_model("model.onnx")?;
//! let mut engine = RewriteEngine::from_model(&model)?;
//!
//! let identity = Pattern::parse("Identity(?, ?)")?;
//! engine.delete(&identity)?;
//! engine.cleanup();
//!
//! save_model(&engine.build_model(&model), "rewritten.onnx")?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod builder;
pub mod error;
pub mod graph;
pub mod io;
pub mod pattern;
pub mod proto;
pub mod traits;
pub mod transform;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use onnx_rewrite::prelude::*`
pub mod prelude {
    pub use crate::builder::{CleanupStats, ModelBuilder};
    pub use crate::error::{OnnxResult, TransformError};
    pub use crate::graph::{GraphContext, NodeId};
    pub use crate::io::{load_model, save_model};
    pub use crate::pattern::{find_matches, format_matches, MatchedChain, Pattern, PatternMatcher};
    pub use crate::proto::onnx::*;
    pub use crate::traits::{DeadCodeElimination, RewritePass, Transformer, TransformerChain};
    pub use crate::transform::{
        RewriteConfig, RewriteEngine, RewriteEvent, RewriteObserver, Substitution,
    };
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use builder::cleanup::cleanup;
pub use error::{OnnxResult, TransformError};
pub use pattern::{find_matches, Pattern};
pub use traits::Transformer;
pub use transform::{delete, replace};

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
