//! Core traits for onnx-rewrite
//!
//! Defines the model-level interface that rewrite passes and cleanup share,
//! so they can be chained.

use crate::builder::cleanup::cleanup;
use crate::error::OnnxResult;
use crate::graph::GraphContext;
use crate::pattern::{MatchedChain, Pattern};
use crate::proto::ModelProto;
use crate::transform::{RewriteConfig, RewriteEngine, Substitution};

/// Transformer trait for model transformations
///
/// Implementations take a model and return the transformed model.
///
/// # Example
///
/// ```ignore
/// struct MyTransformer;
///
/// impl Transformer for MyTransformer {
///     fn transform(&self, model: ModelProto) -> OnnxResult<ModelProto> {
///         Ok(model)
///     }
/// }
/// ```
pub trait Transformer {
    /// Transform the given model
    fn transform(&self, model: ModelProto) -> OnnxResult<ModelProto>;
}

/// Chainable transformer that applies multiple transformers in sequence
pub struct TransformerChain {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformerChain {
    /// Create a new empty transformer chain
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Add a transformer to the chain
    #[allow(clippy::should_implement_trait)]
    pub fn add<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Number of transformers in the chain
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl Default for TransformerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for TransformerChain {
    fn transform(&self, mut model: ModelProto) -> OnnxResult<ModelProto> {
        for transformer in &self.transformers {
            model = transformer.transform(model)?;
        }
        Ok(model)
    }
}

type BoxedRewrite =
    Box<dyn Fn(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution>>;

/// One pattern rewrite as a transformer
///
/// Deletes every match unless a callback is attached with
/// [`with_rewrite`](Self::with_rewrite).
pub struct RewritePass {
    pattern: Pattern,
    config: RewriteConfig,
    rewrite: Option<BoxedRewrite>,
}

impl RewritePass {
    /// Deletion pass for `pattern`
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            config: RewriteConfig::default(),
            rewrite: None,
        }
    }

    /// Parse `text` and build a deletion pass
    pub fn parse(text: &str) -> OnnxResult<Self> {
        Pattern::parse(text).map(Self::new)
    }

    /// Set the rewrite configuration
    pub fn with_config(mut self, config: RewriteConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a rewrite callback
    pub fn with_rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution> + 'static,
    {
        self.rewrite = Some(Box::new(rewrite));
        self
    }

    /// The pattern this pass matches
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

impl Transformer for RewritePass {
    fn transform(&self, model: ModelProto) -> OnnxResult<ModelProto> {
        let mut engine = RewriteEngine::from_model(&model)?.with_config(self.config.clone());
        match &self.rewrite {
            Some(rewrite) => engine.replace(&self.pattern, |ctx, i, chain| rewrite(ctx, i, chain))?,
            None => engine.delete(&self.pattern)?,
        };
        Ok(engine.build_model(&model))
    }
}

/// Dead-code elimination as a transformer
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadCodeElimination;

impl Transformer for DeadCodeElimination {
    fn transform(&self, model: ModelProto) -> OnnxResult<ModelProto> {
        let mut ctx = GraphContext::from_model(&model)?;
        cleanup(&mut ctx);
        Ok(ctx.build_model(&model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_node, make_value_info};
    use crate::proto::GraphProto;

    struct IdentityTransformer;

    impl Transformer for IdentityTransformer {
        fn transform(&self, model: ModelProto) -> OnnxResult<ModelProto> {
            Ok(model)
        }
    }

    fn make_test_model() -> ModelProto {
        ModelProto {
            ir_version: 8,
            graph: Some(GraphProto {
                node: vec![
                    make_node("Relu", &["X"], &["a"], "relu_0"),
                    make_node("Identity", &["a"], &["b"], "identity_0"),
                    make_node("Sigmoid", &["b"], &["s"], "sigmoid_0"),
                    make_node("Mul", &["b", "s"], &["Y"], "mul_0"),
                    make_node("Neg", &["a"], &["unused"], "neg_0"),
                ],
                input: vec![make_value_info("X")],
                output: vec![make_value_info("Y")],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn op_types(model: &ModelProto) -> Vec<String> {
        model
            .graph
            .as_ref()
            .map(|g| g.node.iter().map(|n| n.op_type.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_transformer_chain() {
        let chain = TransformerChain::new()
            .add(IdentityTransformer)
            .add(IdentityTransformer);
        assert_eq!(chain.len(), 2);

        let model = make_test_model();
        let result = chain.transform(model.clone()).unwrap();
        assert_eq!(result, model);
    }

    #[test]
    fn test_rewrite_pass_deletes() {
        let pass = RewritePass::parse("Identity(?, ?)").unwrap();
        let result = pass.transform(make_test_model()).unwrap();

        assert_eq!(op_types(&result), vec!["Relu", "Sigmoid", "Mul", "Neg"]);
    }

    #[test]
    fn test_chain_of_rewrite_and_cleanup() {
        let swish = RewritePass::parse("Sigmoid(?, x0)\nMul(x0, ?)")
            .unwrap()
            .with_rewrite(|ctx, i, chain| {
                let sigmoid = ctx.require_node(chain.ids()[0])?;
                let mul = ctx.require_node(chain.ids()[1])?;
                let relu = make_node(
                    "Relu",
                    &[sigmoid.input[0].as_str()],
                    &[mul.output[0].as_str()],
                    &format!("swish_relu_{i}"),
                );
                Ok(Substitution::new().insert(relu))
            });

        let chain = TransformerChain::new()
            .add(RewritePass::parse("Identity(?, ?)").unwrap())
            .add(swish)
            .add(DeadCodeElimination);

        let result = chain.transform(make_test_model()).unwrap();
        assert_eq!(op_types(&result), vec!["Relu", "Relu"]);
    }
}
