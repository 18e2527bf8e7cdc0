//! Error types for onnx-rewrite
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for pattern parsing and graph rewriting
#[derive(Error, Debug)]
pub enum TransformError {
    /// Pattern text contained no pattern lines
    #[error("Pattern is empty")]
    EmptyPattern,

    /// Malformed pattern line
    #[error("Invalid pattern line '{line}': {reason}")]
    PatternSyntax {
        /// Offending line (whitespace stripped)
        line: String,
        /// What was wrong with it
        reason: String,
    },

    /// Input spec references a variable no earlier step binds
    #[error("Unbound variable '{variable}' in pattern line '{line}'")]
    UnboundVariable {
        /// Variable name
        variable: String,
        /// Offending line (whitespace stripped)
        line: String,
    },

    /// Pure deletion cannot bridge the hole left by the chain
    #[error(
        "Cannot delete subgraph [{chain}]: first node has {inputs} inputs but last node has {outputs} outputs"
    )]
    ArityMismatch {
        /// Matched chain labels
        chain: String,
        /// Input count of the first node
        inputs: usize,
        /// Output count of the last node
        outputs: usize,
    },

    /// Two matches of one rewrite pass share a node
    #[error("Matches {first} and {second} overlap on node {node}")]
    OverlappingMatches {
        /// Index of the earlier match
        first: usize,
        /// Index of the later match
        second: usize,
        /// Shared node label
        node: String,
    },

    /// Node handle no longer present in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf decode error
    #[error("Protobuf decode error: {0}")]
    ProtoDecode(#[from] prost::DecodeError),
}

impl TransformError {
    pub(crate) fn syntax(line: &str, reason: impl Into<String>) -> Self {
        Self::PatternSyntax {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for ONNX operations
pub type OnnxResult<T> = Result<T, TransformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransformError::syntax("Conv(?)", "expected 2 argument slots, found 1");
        let msg = err.to_string();
        assert!(msg.contains("Conv(?)"));
        assert!(msg.contains("found 1"));
    }

    #[test]
    fn test_arity_mismatch_display() {
        let err = TransformError::ArityMismatch {
            chain: "conv_0(Conv), relu_0(Relu)".to_string(),
            inputs: 2,
            outputs: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("conv_0(Conv)"));
        assert!(msg.contains("2 inputs"));
        assert!(msg.contains("1 outputs"));
    }
}
