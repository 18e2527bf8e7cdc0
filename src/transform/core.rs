//! Core rewrite loop
//!
//! A rewrite pass matches a pattern once against the unmodified graph, then
//! handles each matched chain in order: the chain is either deleted (and the
//! hole bridged) or replaced by the nodes a callback returns.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::builder::cleanup::{cleanup, CleanupStats};
use crate::error::{OnnxResult, TransformError};
use crate::graph::{GraphContext, NodeId};
use crate::pattern::{
    format_matches, MatchedChain, Pattern, PatternMatcher, DEFAULT_MAX_SEARCH_STATES,
};
use crate::proto::{GraphProto, ModelProto, NodeProto, TensorProto};

use super::bridge::{bridge_removed_chain, check_chain_arity};
use super::eliminate::remove_private_constants;
use super::observer::{RewriteEvent, RewriteObserver, TracingObserver};

/// Rewrite configuration
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    /// Whether to run dead-code cleanup after each pass
    pub cleanup_after: bool,
    /// Keep constants and initializers that surviving nodes still read
    pub protect_shared_constants: bool,
    /// Search states explored per anchor before giving up on it
    pub max_search_states: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            cleanup_after: false,
            protect_shared_constants: true,
            max_search_states: DEFAULT_MAX_SEARCH_STATES,
        }
    }
}

/// Statistics from one or more rewrite passes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteStats {
    /// Number of chains matched
    pub matches: usize,
    /// Chains removed with bridging
    pub deletions: usize,
    /// Chains substituted
    pub replacements: usize,
    /// Matched nodes removed (kept nodes excluded)
    pub nodes_removed: usize,
    /// New nodes inserted
    pub nodes_inserted: usize,
    /// Constant nodes removed with their readers
    pub constants_removed: usize,
    /// Initializers removed with their readers
    pub initializers_removed: usize,
    /// Initializers appended by callbacks
    pub initializers_added: usize,
    /// Cleanup results, when cleanup ran
    pub cleanup: CleanupStats,
}

impl RewriteStats {
    fn merge(&mut self, other: &RewriteStats) {
        self.matches += other.matches;
        self.deletions += other.deletions;
        self.replacements += other.replacements;
        self.nodes_removed += other.nodes_removed;
        self.nodes_inserted += other.nodes_inserted;
        self.constants_removed += other.constants_removed;
        self.initializers_removed += other.initializers_removed;
        self.initializers_added += other.initializers_added;
        self.cleanup.nodes_removed += other.cleanup.nodes_removed;
        self.cleanup.initializers_removed += other.cleanup.initializers_removed;
    }
}

// ============================================================================
// Substitution
// ============================================================================

#[derive(Debug, Clone)]
enum Replacement {
    Keep(NodeId),
    Insert(NodeProto),
}

/// What a rewrite callback puts in place of a matched chain
///
/// An empty substitution deletes the chain and bridges the hole.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    nodes: Vec<Replacement>,
    initializers: Vec<TensorProto>,
}

impl Substitution {
    /// Empty substitution (pure deletion)
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitution made of new nodes, in order
    pub fn from_nodes<I: IntoIterator<Item = NodeProto>>(nodes: I) -> Self {
        Self {
            nodes: nodes.into_iter().map(Replacement::Insert).collect(),
            initializers: Vec::new(),
        }
    }

    /// Keep a matched node, along with any edits the callback made to it
    pub fn keep(mut self, id: NodeId) -> Self {
        self.nodes.push(Replacement::Keep(id));
        self
    }

    /// Insert a new node
    pub fn insert(mut self, node: NodeProto) -> Self {
        self.nodes.push(Replacement::Insert(node));
        self
    }

    /// Append an initializer to the graph
    pub fn with_initializer(mut self, tensor: TensorProto) -> Self {
        self.initializers.push(tensor);
        self
    }

    /// True when no nodes take the chain's place
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of replacement nodes (kept and new)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn kept(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter_map(|r| match r {
            Replacement::Keep(id) => Some(*id),
            Replacement::Insert(_) => None,
        })
    }
}

/// Rewrite callback: graph, match index and matched chain in, substitution out
///
/// The callback runs before the chain is touched and may edit the graph.
pub type RewriteFn<'f> =
    dyn FnMut(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution> + 'f;

// ============================================================================
// Rewrite passes
// ============================================================================

/// Match `pattern` and hand each chain to `callback`, or delete it when
/// there is no callback
pub fn rewrite(
    ctx: &mut GraphContext,
    pattern: &Pattern,
    mut callback: Option<&mut RewriteFn<'_>>,
    config: &RewriteConfig,
    observer: &mut dyn RewriteObserver,
) -> OnnxResult<RewriteStats> {
    let matches = PatternMatcher::new(ctx)
        .with_max_states(config.max_search_states)
        .find_all(pattern);

    check_overlaps(ctx, &matches)?;
    if callback.is_none() {
        for chain in &matches {
            check_chain_arity(ctx, chain)?;
        }
    }

    let mut stats = RewriteStats {
        matches: matches.len(),
        ..Default::default()
    };

    for (index, chain) in matches.iter().enumerate() {
        for &id in chain {
            ctx.require_node(id)?;
        }
        let substitution = match callback.as_deref_mut() {
            Some(rewrite_fn) => rewrite_fn(ctx, index, chain)?,
            None => Substitution::new(),
        };
        apply_substitution(ctx, index, chain, substitution, config, observer, &mut stats)?;
    }

    if config.cleanup_after {
        stats.cleanup = cleanup(ctx);
        observer.notify(&RewriteEvent::CleanedUp(&stats.cleanup));
    }

    Ok(stats)
}

/// Replace every match of `pattern` with what `rewrite_fn` returns
///
/// Returns the number of chains processed.
pub fn replace<F>(
    ctx: &mut GraphContext,
    pattern: &Pattern,
    mut rewrite_fn: F,
    config: &RewriteConfig,
    observer: &mut dyn RewriteObserver,
) -> OnnxResult<usize>
where
    F: FnMut(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution>,
{
    let callback: &mut RewriteFn<'_> = &mut rewrite_fn;
    rewrite(ctx, pattern, Some(callback), config, observer).map(|stats| stats.matches)
}

/// Delete every match of `pattern`, bridging each hole
///
/// Returns the number of chains processed.
pub fn delete(
    ctx: &mut GraphContext,
    pattern: &Pattern,
    config: &RewriteConfig,
    observer: &mut dyn RewriteObserver,
) -> OnnxResult<usize> {
    rewrite(ctx, pattern, None, config, observer).map(|stats| stats.matches)
}

/// Fail if two chains share a node
fn check_overlaps(ctx: &GraphContext, matches: &[MatchedChain]) -> OnnxResult<()> {
    let mut owner: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (index, chain) in matches.iter().enumerate() {
        for &id in chain {
            if let Some(&first) = owner.get(&id) {
                return Err(TransformError::OverlappingMatches {
                    first,
                    second: index,
                    node: ctx.label(id),
                });
            }
            owner.insert(id, index);
        }
    }
    Ok(())
}

fn apply_substitution(
    ctx: &mut GraphContext,
    index: usize,
    chain: &MatchedChain,
    substitution: Substitution,
    config: &RewriteConfig,
    observer: &mut dyn RewriteObserver,
    stats: &mut RewriteStats,
) -> OnnxResult<()> {
    // Everything that can fail is checked before the chain is taken out
    let mut kept_ids: SmallVec<[NodeId; 6]> = SmallVec::new();
    for id in substitution.kept() {
        if !chain.contains(id) {
            return Err(TransformError::NodeNotFound(format!(
                "{} is not part of match {index}",
                ctx.label(id)
            )));
        }
        if kept_ids.contains(&id) {
            return Err(TransformError::NodeNotFound(format!(
                "{} kept twice in match {index}",
                ctx.label(id)
            )));
        }
        kept_ids.push(id);
    }
    if substitution.is_empty() {
        check_chain_arity(ctx, chain)?;
    }

    let removed_labels: Vec<String> = chain.ids().iter().map(|&id| ctx.label(id)).collect();
    let insert_at = chain
        .ids()
        .iter()
        .filter_map(|&id| ctx.position_of(id))
        .min()
        .unwrap_or_else(|| ctx.node_count());

    let mut taken: SmallVec<[(NodeId, NodeProto); 6]> = SmallVec::new();
    for &id in chain {
        let node = ctx
            .remove_node(id)
            .ok_or_else(|| TransformError::NodeNotFound(id.to_string()))?;
        taken.push((id, node));
    }

    let Substitution {
        nodes: replacements,
        initializers,
    } = substitution;

    if replacements.is_empty() {
        let (Some((_, first)), Some((_, last))) = (taken.first(), taken.last()) else {
            return Ok(());
        };
        bridge_removed_chain(ctx, first, last, &removed_labels.join(", "))?;

        stats.deletions += 1;
        stats.nodes_removed += taken.len();
        observer.notify(&RewriteEvent::Deleted {
            index,
            removed: &removed_labels,
        });
    } else {
        let mut inserted_labels = Vec::with_capacity(replacements.len());
        let mut kept = 0;
        let mut position = insert_at;

        for replacement in replacements {
            match replacement {
                Replacement::Keep(id) => {
                    let Some(slot) = taken.iter().position(|(taken_id, _)| *taken_id == id) else {
                        return Err(TransformError::NodeNotFound(format!(
                            "{id} kept twice in match {index}"
                        )));
                    };
                    let (id, node) = taken.swap_remove(slot);
                    inserted_labels.push(node.label());
                    ctx.restore_node_at(position, id, node);
                    kept += 1;
                }
                Replacement::Insert(node) => {
                    inserted_labels.push(node.label());
                    ctx.insert_node_at(position, node);
                    stats.nodes_inserted += 1;
                }
            }
            position += 1;
        }

        stats.replacements += 1;
        stats.nodes_removed += chain.len() - kept;
        observer.notify(&RewriteEvent::Replaced {
            index,
            removed: &removed_labels,
            inserted: &inserted_labels,
        });
    }

    // `taken` now holds only the dropped nodes
    let eliminated = remove_private_constants(
        ctx,
        taken.iter().map(|(_, node)| node),
        config.protect_shared_constants,
    );
    stats.constants_removed += eliminated.constants_removed;
    stats.initializers_removed += eliminated.initializers_removed;

    stats.initializers_added += initializers.len();
    for tensor in initializers {
        ctx.add_initializer(tensor);
    }

    Ok(())
}

// ============================================================================
// Engine
// ============================================================================

/// Rewrite engine owning a graph
///
/// Wraps a `GraphContext` together with a configuration, an observer and
/// accumulated statistics.
pub struct RewriteEngine {
    ctx: GraphContext,
    config: RewriteConfig,
    stats: RewriteStats,
    observer: Box<dyn RewriteObserver>,
}

impl RewriteEngine {
    /// Create a new rewrite engine from a graph
    pub fn new(graph: &GraphProto) -> Self {
        Self::from_context(GraphContext::new(graph))
    }

    /// Create from a model
    pub fn from_model(model: &ModelProto) -> OnnxResult<Self> {
        GraphContext::from_model(model).map(Self::from_context)
    }

    /// Create from an existing context
    pub fn from_context(ctx: GraphContext) -> Self {
        Self {
            ctx,
            config: RewriteConfig::default(),
            stats: RewriteStats::default(),
            observer: Box::new(TracingObserver),
        }
    }

    /// Configure the engine
    pub fn with_config(mut self, config: RewriteConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default `tracing` observer
    pub fn with_observer<O: RewriteObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Get the current context
    pub fn context(&self) -> &GraphContext {
        &self.ctx
    }

    /// Get mutable context
    pub fn context_mut(&mut self) -> &mut GraphContext {
        &mut self.ctx
    }

    /// Get the configuration
    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Get accumulated statistics
    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }

    /// Find all matches of `pattern` in the current graph
    pub fn find_matches(&self, pattern: &Pattern) -> Vec<MatchedChain> {
        PatternMatcher::new(&self.ctx)
            .with_max_states(self.config.max_search_states)
            .find_all(pattern)
    }

    /// Human-readable listing of the matches of `pattern`
    pub fn describe_matches(&self, pattern: &Pattern) -> String {
        let matches = self.find_matches(pattern);
        format_matches(&self.ctx, pattern, &matches)
    }

    /// Replace every match of `pattern`, returning the number of matches
    pub fn replace<F>(&mut self, pattern: &Pattern, mut rewrite_fn: F) -> OnnxResult<usize>
    where
        F: FnMut(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution>,
    {
        let callback: &mut RewriteFn<'_> = &mut rewrite_fn;
        self.rewrite(pattern, Some(callback))
    }

    /// Delete every match of `pattern`, returning the number of matches
    pub fn delete(&mut self, pattern: &Pattern) -> OnnxResult<usize> {
        self.rewrite(pattern, None)
    }

    /// Run one rewrite pass with an optional callback
    pub fn rewrite(
        &mut self,
        pattern: &Pattern,
        callback: Option<&mut RewriteFn<'_>>,
    ) -> OnnxResult<usize> {
        let pass = rewrite(
            &mut self.ctx,
            pattern,
            callback,
            &self.config,
            self.observer.as_mut(),
        )?;
        self.stats.merge(&pass);
        Ok(pass.matches)
    }

    /// Remove nodes and initializers that reach no graph output
    pub fn cleanup(&mut self) -> CleanupStats {
        let result = cleanup(&mut self.ctx);
        self.observer.notify(&RewriteEvent::CleanedUp(&result));
        self.stats.cleanup.nodes_removed += result.nodes_removed;
        self.stats.cleanup.initializers_removed += result.initializers_removed;
        result
    }

    /// Take the graph context out of the engine
    pub fn into_context(self) -> GraphContext {
        self.ctx
    }

    /// Build the rewritten graph
    pub fn build_graph(&self) -> GraphProto {
        self.ctx.build_graph()
    }

    /// Build the rewritten model, copying metadata from `original`
    pub fn build_model(&self, original: &ModelProto) -> ModelProto {
        self.ctx.build_model(original)
    }
}
