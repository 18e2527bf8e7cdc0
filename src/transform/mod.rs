//! Graph rewriting module
//!
//! This module provides the rewrite infrastructure built on pattern matches:
//!
//! - [`RewriteEngine`]: Owns a graph and runs rewrite passes on it
//! - [`eliminate`]: Removal of constants private to dropped nodes
//! - [`bridge`]: Reconnection after a chain is deleted
//! - [`observer`]: Reporting of what each pass did
//!
//! # Overview
//!
//! Rewrites work on a `GraphContext` and modify it in place. The typical
//! workflow is:
//!
//! 1. Create a `RewriteEngine` from a graph or model
//! 2. Call `replace` with a callback, or `delete`
//! 3. Build the rewritten graph using `build_graph`
//!
//! # Example
//!
//! ```ignore
//! use onnx_rewrite::pattern::Pattern;
//! use onnx_rewrite::proto::extensions::make_node;
//! use onnx_rewrite::transform::{RewriteEngine, Substitution};
//!
//! let mut engine = RewriteEngine::from_model(&model)?;
//! let swish = Pattern::parse("Sigmoid(?, x0)\nMul(x0, ?)")?;
//!
//! engine.replace(&swish, |ctx, i, chain| {
//!     let sigmoid = ctx.require_node(chain.ids()[0])?;
//!     let mul = ctx.require_node(chain.ids()[1])?;
//!     let relu = make_node(
//!         "Relu",
//!         &[sigmoid.input[0].as_str()],
//!         &[mul.output[0].as_str()],
//!         &format!("relu_{i}"),
//!     );
//!     Ok(Substitution::new().insert(relu))
//! })?;
//!
//! let rewritten = engine.build_model(&model);
//! ```

pub mod bridge;
pub mod core;
pub mod eliminate;
pub mod observer;

// Re-export main types and functions
pub use bridge::{bridge_removed_chain, check_arity, check_chain_arity};

pub use self::core::{
    delete, replace, rewrite, RewriteConfig, RewriteEngine, RewriteFn, RewriteStats,
    Substitution,
};

pub use eliminate::{remove_private_constants, EliminationStats};

pub use observer::{NullObserver, RewriteEvent, RewriteObserver, TracingObserver};
