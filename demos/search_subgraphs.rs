//! Search a model for subgraphs matching two patterns
//!
//! Run with: cargo run --example search_subgraphs [model.onnx]
//! Without a path, a small synthetic graph is searched.

use std::env;

use onnx_rewrite::io::{load_model, ModelInfo};
use onnx_rewrite::prelude::*;
use onnx_rewrite::proto::extensions::{make_node, make_tensor, make_value_info};
use tracing_subscriber::EnvFilter;

fn synthetic_model() -> ModelProto {
    ModelProto {
        ir_version: 8,
        graph: Some(GraphProto {
            name: "synthetic".to_string(),
            node: vec![
                make_node("Conv", &["images", "w0"], &["c0"], "conv_0"),
                make_node("Sigmoid", &["c0"], &["s0"], "sigmoid_0"),
                make_node("Mul", &["c0", "s0"], &["m0"], "mul_0"),
                make_node("Conv", &["m0", "w1"], &["c1"], "conv_1"),
                make_node("Sigmoid", &["c1"], &["s1"], "sigmoid_1"),
                make_node("Slice", &["s1"], &["a1"], "slice_0"),
                make_node("Mul", &["a1", "a1"], &["b1"], "mul_1"),
                make_node("Pow", &["b1", "c1"], &["output"], "pow_0"),
            ],
            input: vec![make_value_info("images")],
            output: vec![make_value_info("output")],
            initializer: vec![make_tensor("w0", &[1], &[1.0]), make_tensor("w1", &[1], &[1.0])],
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let model = match env::args().nth(1) {
        Some(path) => load_model(path)?,
        None => synthetic_model(),
    };
    let info = ModelInfo::from_model(&model);
    println!(
        "Model '{}': {} nodes, {} initializers",
        info.graph_name, info.node_count, info.initializer_count
    );

    let ctx = GraphContext::from_model(&model)?;

    let sigmoid_pow = Pattern::parse(
        "
        Sigmoid(?, x0)
        Slice(x0, a0)
        Mul(a0, b0)
        Pow(b0, ?)
        ",
    )?;
    let conv_to_conv = Pattern::parse(
        "
        Conv(?, ?)
        ?(?, ?)
        ?(?, ?)
        Conv(?, ?)
        ",
    )?;

    for pattern in [&sigmoid_pow, &conv_to_conv] {
        let matches = find_matches(&ctx, pattern);
        println!("{}", format_matches(&ctx, pattern, &matches));
    }

    Ok(())
}
