//! Model builder for ONNX models
//!
//! Assembles a rewritten model from the original model's metadata and a
//! `GraphContext`.

use crate::graph::GraphContext;
use crate::proto::ModelProto;

use super::cleanup::{cleanup, CleanupStats};

/// Model builder for assembling rewritten models
#[derive(Debug)]
pub struct ModelBuilder {
    /// Original model (for metadata)
    original: ModelProto,
    /// Producer name override
    producer_name: Option<String>,
    /// Producer version override
    producer_version: Option<String>,
    /// Whether to run dead-code cleanup before building
    cleanup: bool,
}

impl ModelBuilder {
    /// Create a new builder from an original model
    pub fn new(model: ModelProto) -> Self {
        Self {
            original: model,
            producer_name: None,
            producer_version: None,
            cleanup: false,
        }
    }

    /// Set producer name
    pub fn producer_name(mut self, name: &str) -> Self {
        self.producer_name = Some(name.to_string());
        self
    }

    /// Set producer version
    pub fn producer_version(mut self, version: &str) -> Self {
        self.producer_version = Some(version.to_string());
        self
    }

    /// Enable or disable dead-code cleanup
    pub fn cleanup(mut self, enabled: bool) -> Self {
        self.cleanup = enabled;
        self
    }

    /// Build the model, consuming the context
    pub fn build(self, mut ctx: GraphContext) -> (ModelProto, CleanupStats) {
        let stats = if self.cleanup {
            cleanup(&mut ctx)
        } else {
            CleanupStats::default()
        };

        let mut model = ctx.build_model(&self.original);
        if let Some(name) = self.producer_name {
            model.producer_name = name;
        }
        if let Some(version) = self.producer_version {
            model.producer_version = version;
        }
        (model, stats)
    }
}

/// Build a model from `original` with the context's graph
pub fn build_model(ctx: &GraphContext, original: &ModelProto) -> ModelProto {
    ctx.build_model(original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_node, make_value_info};
    use crate::proto::GraphProto;

    fn make_test_model() -> ModelProto {
        ModelProto {
            ir_version: 7,
            producer_name: "exporter".to_string(),
            graph: Some(GraphProto {
                node: vec![
                    make_node("Relu", &["X"], &["Y"], "relu_0"),
                    make_node("Neg", &["X"], &["unused"], "neg_0"),
                ],
                input: vec![make_value_info("X")],
                output: vec![make_value_info("Y")],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_overrides_metadata() {
        let model = make_test_model();
        let ctx = GraphContext::from_model(&model).unwrap();

        let (built, stats) = ModelBuilder::new(model)
            .producer_name("onnx-rewrite")
            .producer_version("0.1.0")
            .build(ctx);

        assert_eq!(built.ir_version, 7);
        assert_eq!(built.producer_name, "onnx-rewrite");
        assert_eq!(built.producer_version, "0.1.0");
        assert!(stats.is_empty());
        assert_eq!(built.graph.unwrap().node.len(), 2);
    }

    #[test]
    fn test_builder_with_cleanup() {
        let model = make_test_model();
        let ctx = GraphContext::from_model(&model).unwrap();

        let (built, stats) = ModelBuilder::new(model).cleanup(true).build(ctx);

        assert_eq!(stats.nodes_removed, 1);
        assert_eq!(built.producer_name, "exporter");
        assert_eq!(built.graph.unwrap().node.len(), 1);
    }
}
