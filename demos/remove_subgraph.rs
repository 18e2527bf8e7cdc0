//! Remove subgraphs from a model
//!
//! Run with: cargo run --example remove_subgraph [model.onnx [output.onnx]]
//! Without a path, a small synthetic graph is rewritten.

use std::env;

use onnx_rewrite::io::{load_model, save_model};
use onnx_rewrite::prelude::*;
use onnx_rewrite::proto::extensions::{make_node, make_tensor, make_value_info};
use tracing_subscriber::EnvFilter;

fn synthetic_model() -> ModelProto {
    ModelProto {
        ir_version: 8,
        graph: Some(GraphProto {
            name: "synthetic".to_string(),
            node: vec![
                make_node("Mul", &["images", "scale"], &["a0"], "mul_0"),
                make_node("Conv", &["a0", "w0"], &["b0"], "conv_0"),
                make_node("Reshape", &["b0", "shape"], &["c0"], "reshape_0"),
                make_node("Transpose", &["c0"], &["d0"], "transpose_0"),
                make_node("Sigmoid", &["d0"], &["e0"], "sigmoid_0"),
                make_node("Identity", &["e0"], &["output"], "identity_0"),
            ],
            input: vec![make_value_info("images")],
            output: vec![make_value_info("output")],
            initializer: vec![
                make_tensor("scale", &[1], &[0.5]),
                make_tensor("w0", &[1], &[1.0]),
                make_tensor("shape", &[1], &[-1.0]),
            ],
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let model = match args.next() {
        Some(path) => load_model(path)?,
        None => synthetic_model(),
    };
    let mut engine = RewriteEngine::from_model(&model)?;

    // Drop the middle of Mul -> Conv -> Reshape -> Transpose -> Sigmoid,
    // keeping both ends and wiring them together.
    let middle = Pattern::parse(
        "
        Mul(?, a0)
        Conv(a0, b0)
        Reshape(b0, c0)
        Transpose(c0, d0)
        Sigmoid(d0, ?)
        ",
    )?;
    println!("{}", engine.describe_matches(&middle));

    let replaced = engine.replace(&middle, |ctx, _, chain| {
        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            return Ok(Substitution::new());
        };
        let first_out = ctx.require_node(first)?.output[0].clone();
        if let Some(sigmoid) = ctx.node_mut(last) {
            sigmoid.input[0] = first_out;
        }
        Ok(Substitution::new().keep(first).keep(last))
    })?;
    println!("Done for replace {replaced} subgraphs.");

    // Plain deletion bridges the hole
    let identity = Pattern::parse("Identity(?, ?)")?;
    let deleted = engine.delete(&identity)?;
    println!("Done for delete {deleted} subgraphs.");

    let stats = engine.stats();
    println!(
        "Removed {} nodes, {} constants, {} initializers",
        stats.nodes_removed, stats.constants_removed, stats.initializers_removed
    );

    let rewritten = engine.build_model(&model);
    if let Some(output) = args.next() {
        save_model(&rewritten, &output)?;
        println!("Saved to {output}");
    }

    Ok(())
}
