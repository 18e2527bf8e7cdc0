//! Pattern matching module for ONNX graph rewriting
//!
//! Patterns are written in a small line-oriented language (see [`parser`])
//! and matched as forward chains through the graph (see [`matcher`]).
//!
//! # Example
//!
//! ```ignore
//! use onnx_rewrite::pattern::{find_matches, format_matches, Pattern};
//!
//! let pattern = Pattern::parse(
//!     "
//!     Conv(?, c0)
//!     Sigmoid(c0, s0)
//!     Mul([s0, c0], ?)
//!     ",
//! )?;
//!
//! let matches = find_matches(&ctx, &pattern);
//! println!("{}", format_matches(&ctx, &pattern, &matches));
//! ```

pub mod matcher;
pub mod parser;

// Re-export main types
pub use matcher::{
    find_matches, format_matches, MatchedChain, PatternMatcher, DEFAULT_MAX_SEARCH_STATES,
};
pub use parser::{BindSpec, OpTypes, Pattern, PatternStep, Slot, VarId};
