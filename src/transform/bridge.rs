//! Bridge the hole left by a deleted chain
//!
//! Deleting a chain leaves its last node's outputs without a producer. The
//! first node's inputs are mapped positionally onto those outputs, and each
//! producer of an input is renamed to emit the mapped output instead.

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::pattern::MatchedChain;
use crate::proto::NodeProto;

/// Fail with `ArityMismatch` unless `first` has as many inputs as `last` has
/// outputs
pub fn check_arity(first: &NodeProto, last: &NodeProto, chain: &str) -> OnnxResult<()> {
    if first.input.len() != last.output.len() {
        return Err(TransformError::ArityMismatch {
            chain: chain.to_string(),
            inputs: first.input.len(),
            outputs: last.output.len(),
        });
    }
    Ok(())
}

/// Check that a chain still in the graph could be bridged after deletion
pub fn check_chain_arity(ctx: &GraphContext, chain: &MatchedChain) -> OnnxResult<()> {
    let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
        return Ok(());
    };
    check_arity(
        ctx.require_node(first)?,
        ctx.require_node(last)?,
        &chain.describe(ctx),
    )
}

/// Reconnect the graph around a removed chain
///
/// `first` and `last` are the chain's first and last nodes, already removed
/// from `ctx`. Returns the number of producer outputs and consumer inputs
/// that were rewired.
pub fn bridge_removed_chain(
    ctx: &mut GraphContext,
    first: &NodeProto,
    last: &NodeProto,
    chain: &str,
) -> OnnxResult<usize> {
    check_arity(first, last, chain)?;

    let mut bridged = 0;
    for (input, output) in first.input.iter().zip(&last.output) {
        if input.is_empty() || output.is_empty() || input == output {
            continue;
        }

        let producers = ctx.nodes_producing(input);
        if producers.is_empty() {
            // Graph input or initializer: readers of the output move instead
            let moved = ctx.redirect_consumers(output, input);
            if ctx.is_graph_output(output) {
                tracing::warn!(
                    tensor = %input,
                    output = %output,
                    "graph output loses its producer after deletion"
                );
            }
            bridged += moved;
            continue;
        }

        for id in producers {
            if ctx.rename_node_output(id, input, output) {
                bridged += 1;
            }
        }
        // Readers of the old name outside the chain follow the rename
        let followers = ctx.redirect_consumers(input, output);
        if followers > 0 {
            tracing::debug!(from = %input, to = %output, followers, "redirected side readers");
        }
        bridged += followers;
    }

    Ok(bridged)
}
