//! Rewrite observers
//!
//! The rewrite engine never prints. Every deletion, substitution and cleanup
//! is reported as a [`RewriteEvent`] to a [`RewriteObserver`]; the default
//! observer forwards events to `tracing`.

use crate::builder::CleanupStats;

/// Something that happened during a rewrite pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteEvent<'a> {
    /// A matched chain was removed and the hole bridged
    Deleted {
        /// Match index within the pass
        index: usize,
        /// `name(op_type)` labels of the removed nodes
        removed: &'a [String],
    },
    /// A matched chain was substituted
    Replaced {
        /// Match index within the pass
        index: usize,
        /// `name(op_type)` labels of the matched nodes
        removed: &'a [String],
        /// `name(op_type)` labels of the nodes put in their place
        inserted: &'a [String],
    },
    /// Dead-code cleanup ran after the pass
    CleanedUp(&'a CleanupStats),
}

/// Receiver of rewrite events
pub trait RewriteObserver {
    /// Handle one event
    fn notify(&mut self, event: &RewriteEvent<'_>);
}

impl<F> RewriteObserver for F
where
    F: FnMut(&RewriteEvent<'_>),
{
    fn notify(&mut self, event: &RewriteEvent<'_>) {
        self(event)
    }
}

/// Observer that emits `tracing` events at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RewriteObserver for TracingObserver {
    fn notify(&mut self, event: &RewriteEvent<'_>) {
        match event {
            RewriteEvent::Deleted { index, removed } => {
                tracing::info!(index, removed = %removed.join(", "), "deleted subgraph");
            }
            RewriteEvent::Replaced {
                index,
                removed,
                inserted,
            } => {
                tracing::info!(
                    index,
                    removed = %removed.join(", "),
                    inserted = %inserted.join(", "),
                    "replaced subgraph"
                );
            }
            RewriteEvent::CleanedUp(stats) => {
                tracing::info!(
                    nodes_removed = stats.nodes_removed,
                    initializers_removed = stats.initializers_removed,
                    "cleaned up graph"
                );
            }
        }
    }
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RewriteObserver for NullObserver {
    fn notify(&mut self, _event: &RewriteEvent<'_>) {}
}
