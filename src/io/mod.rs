//! ONNX I/O module
//!
//! This module provides functions for loading and saving ONNX models, plus
//! file-to-file helpers that run one rewrite pass in between.
//!
//! # Example
//!
//! ```ignore
//! use onnx_rewrite::io::{delete_in_file, load_model, save_model};
//!
//! // Load and save
//! let model = load_model("input.onnx")?;
//! save_model(&model, "output.onnx")?;
//!
//! // One-shot deletion
//! let summary = delete_in_file("input.onnx", "output.onnx", "Identity(?, ?)", Default::default())?;
//! println!("Removed {} nodes", summary.nodes_reduced());
//! ```

pub mod reader;
pub mod writer;

// Re-exports
pub use reader::{load_graph, load_model, load_model_from_bytes, ModelInfo};
pub use writer::{model_size, model_to_bytes, save_model};

use std::path::Path;

use crate::error::OnnxResult;
use crate::graph::GraphContext;
use crate::pattern::{MatchedChain, Pattern};
use crate::proto::ModelProto;
use crate::transform::{RewriteConfig, RewriteEngine, RewriteStats, Substitution};

/// Outcome of rewriting a whole model
#[derive(Debug, Clone, Default)]
pub struct RewriteSummary {
    /// Node count before the pass
    pub original_nodes: usize,
    /// Node count after the pass
    pub rewritten_nodes: usize,
    /// Pass statistics
    pub stats: RewriteStats,
}

impl RewriteSummary {
    /// Net number of nodes removed
    pub fn nodes_reduced(&self) -> usize {
        self.original_nodes.saturating_sub(self.rewritten_nodes)
    }
}

/// Run one rewrite pass over a model in memory
///
/// Without a callback every match is deleted.
pub fn rewrite_model<F>(
    model: &ModelProto,
    pattern: &Pattern,
    rewrite_fn: Option<F>,
    config: RewriteConfig,
) -> OnnxResult<(ModelProto, RewriteSummary)>
where
    F: FnMut(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution>,
{
    let mut engine = RewriteEngine::from_model(model)?.with_config(config);
    let original_nodes = engine.context().node_count();

    match rewrite_fn {
        Some(f) => engine.replace(pattern, f)?,
        None => engine.delete(pattern)?,
    };

    let rewritten = engine.build_model(model);
    let summary = RewriteSummary {
        original_nodes,
        rewritten_nodes: engine.context().node_count(),
        stats: engine.stats().clone(),
    };
    Ok((rewritten, summary))
}

/// Delete every match of `pattern_text` in a model file and save the result
pub fn delete_in_file<P1: AsRef<Path>, P2: AsRef<Path>>(
    input: P1,
    output: P2,
    pattern_text: &str,
    config: RewriteConfig,
) -> OnnxResult<RewriteSummary> {
    let pattern = Pattern::parse(pattern_text)?;
    let model = load_model(input)?;
    let (rewritten, summary) = rewrite_model(&model, &pattern, None::<NoRewrite>, config)?;
    save_model(&rewritten, output)?;
    Ok(summary)
}

/// Placeholder callback type for deletion-only passes
type NoRewrite = fn(&mut GraphContext, usize, &MatchedChain) -> OnnxResult<Substitution>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_node, make_tensor, make_value_info};
    use crate::proto::GraphProto;

    fn make_test_model() -> ModelProto {
        ModelProto {
            ir_version: 8,
            producer_name: "test".to_string(),
            graph: Some(GraphProto {
                name: "test_graph".to_string(),
                node: vec![
                    make_node("Conv", &["X", "W"], &["conv_out"], "conv_0"),
                    make_node("Identity", &["conv_out"], &["id_out"], "identity_0"),
                    make_node("Relu", &["id_out"], &["Y"], "relu_0"),
                ],
                input: vec![make_value_info("X")],
                output: vec![make_value_info("Y")],
                initializer: vec![make_tensor("W", &[1, 1, 3, 3], &[0.0; 9])],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_rewrite_model_replace() {
        let model = make_test_model();
        let pattern = Pattern::parse("Identity(?, ?)").unwrap();

        let (rewritten, summary) = rewrite_model(
            &model,
            &pattern,
            Some(|ctx: &mut GraphContext, _: usize, chain: &MatchedChain| -> OnnxResult<Substitution> {
                let identity = ctx.require_node(chain.ids()[0])?;
                let neg = make_node(
                    "Neg",
                    &[identity.input[0].as_str()],
                    &[identity.output[0].as_str()],
                    "neg_0",
                );
                Ok(Substitution::new().insert(neg))
            }),
            RewriteConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.nodes_reduced(), 0);
        assert_eq!(summary.stats.replacements, 1);
        let graph = rewritten.graph.unwrap();
        assert_eq!(graph.node[1].op_type, "Neg");
        assert_eq!(graph.name, "test_graph");
    }

    #[test]
    fn test_delete_in_file() {
        let model = make_test_model();
        let dir = std::env::temp_dir();
        let input_path = dir.join(format!("onnx_rewrite_in_{}.onnx", std::process::id()));
        let output_path = dir.join(format!("onnx_rewrite_out_{}.onnx", std::process::id()));

        save_model(&model, &input_path).unwrap();
        let summary = delete_in_file(
            &input_path,
            &output_path,
            "Identity(?, ?)",
            RewriteConfig::default(),
        )
        .unwrap();
        let loaded = load_model(&output_path).unwrap();

        std::fs::remove_file(&input_path).ok();
        std::fs::remove_file(&output_path).ok();

        assert_eq!(summary.nodes_reduced(), 1);
        assert_eq!(summary.stats.deletions, 1);
        let graph = loaded.graph.unwrap();
        assert_eq!(graph.node.len(), 2);
        assert_eq!(graph.node[0].output[0], "id_out");
        assert_eq!(graph.node[1].input[0], "id_out");
    }

    #[test]
    fn test_delete_in_file_keeps_unindexed_model_content() {
        use crate::proto::attribute_proto::AttributeType;
        use crate::proto::tensor_proto::DataLocation;
        use crate::proto::{AttributeProto, FunctionProto, StringStringEntryProto};

        let mut model = make_test_model();
        model.metadata_props = vec![StringStringEntryProto {
            key: "source".to_string(),
            value: "exporter".to_string(),
        }];
        model.functions = vec![FunctionProto {
            name: "local_fn".to_string(),
            ..Default::default()
        }];
        let graph = model.graph.as_mut().unwrap();
        graph.initializer[0].data_location = DataLocation::External as i32;
        graph.initializer[0].external_data = vec![StringStringEntryProto {
            key: "location".to_string(),
            value: "weights.bin".to_string(),
        }];
        let branch = GraphProto {
            node: vec![make_node("Identity", &["Y"], &["b"], "branch_identity")],
            ..Default::default()
        };
        graph.node[2].attribute.push(AttributeProto {
            name: "body".to_string(),
            r#type: AttributeType::Graph as i32,
            g: Some(branch.clone()),
            ..Default::default()
        });

        let dir = std::env::temp_dir();
        let input_path = dir.join(format!("onnx_rewrite_keep_in_{}.onnx", std::process::id()));
        let output_path = dir.join(format!("onnx_rewrite_keep_out_{}.onnx", std::process::id()));
        save_model(&model, &input_path).unwrap();
        let summary = delete_in_file(
            &input_path,
            &output_path,
            "Identity(?, ?)",
            RewriteConfig::default(),
        )
        .unwrap();
        let loaded = load_model(&output_path).unwrap();

        std::fs::remove_file(&input_path).ok();
        std::fs::remove_file(&output_path).ok();

        // The Identity inside the subgraph is not part of the main graph
        assert_eq!(summary.stats.deletions, 1);
        assert_eq!(loaded.metadata_props, model.metadata_props);
        assert_eq!(loaded.functions, model.functions);
        let graph = loaded.graph.unwrap();
        assert_eq!(graph.initializer[0].external_data[0].value, "weights.bin");
        assert_eq!(graph.node[1].attribute[0].g.as_ref(), Some(&branch));
    }

    #[test]
    fn test_delete_in_file_rejects_bad_pattern() {
        let result = delete_in_file(
            "unused.onnx",
            "unused_out.onnx",
            "Identity(?)",
            RewriteConfig::default(),
        );
        assert!(matches!(
            result,
            Err(crate::error::TransformError::PatternSyntax { .. })
        ));
    }
}
