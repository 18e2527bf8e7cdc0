//! Replace Conv -> Sigmoid -> Mul (swish) with Conv -> Relu
//!
//! Run with: cargo run --example conv_swish_to_relu [model.onnx [output.onnx]]
//! Without a path, a small synthetic graph is rewritten.

use std::env;

use onnx_rewrite::io::{load_model, save_model};
use onnx_rewrite::prelude::*;
use onnx_rewrite::proto::extensions::{make_node, make_tensor, make_value_info};
use tracing_subscriber::EnvFilter;

fn synthetic_model(blocks: usize) -> ModelProto {
    let mut graph = GraphProto {
        name: "synthetic".to_string(),
        input: vec![make_value_info("t0")],
        output: vec![make_value_info(&format!("t{blocks}"))],
        ..Default::default()
    };
    for i in 0..blocks {
        let (input, weight) = (format!("t{i}"), format!("w{i}"));
        let (conv, sig, out) = (format!("c{i}"), format!("s{i}"), format!("t{}", i + 1));
        graph.initializer.push(make_tensor(&weight, &[1], &[1.0]));
        graph.node.push(make_node(
            "Conv",
            &[input.as_str(), weight.as_str()],
            &[conv.as_str()],
            &format!("conv_{i}"),
        ));
        graph.node.push(make_node(
            "Sigmoid",
            &[conv.as_str()],
            &[sig.as_str()],
            &format!("sigmoid_{i}"),
        ));
        graph.node.push(make_node(
            "Mul",
            &[conv.as_str(), sig.as_str()],
            &[out.as_str()],
            &format!("mul_{i}"),
        ));
    }
    ModelProto {
        ir_version: 8,
        graph: Some(graph),
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
        None => synthetic_model(3),
    };

    let mut engine = RewriteEngine::from_model(&model)?.with_config(RewriteConfig {
        cleanup_after: true,
        ..Default::default()
    });
    let before = engine.context().node_count();

    let swish = Pattern::parse(
        "
        Conv(?, c0)
        Sigmoid(c0, s0)
        Mul([s0, c0], ?)
        ",
    )?;
    println!("{}", engine.describe_matches(&swish));

    let replaced = engine.replace(&swish, |ctx, i, chain| {
        let conv = chain.ids()[0];
        let conv_out = ctx.require_node(conv)?.output[0].clone();
        let mul_out = ctx.require_node(chain.ids()[2])?.output[0].clone();
        let relu = make_node(
            "Relu",
            &[conv_out.as_str()],
            &[mul_out.as_str()],
            &format!("swish_relu_{i}"),
        );
        Ok(Substitution::new().keep(conv).insert(relu))
    })?;

    println!(
        "Replaced {replaced} subgraphs: {before} -> {} nodes",
        engine.context().node_count()
    );

    let rewritten = engine.build_model(&model);
    if let Some(output) = args.next() {
        save_model(&rewritten, &output)?;
        println!("Saved to {output}");
    }

    Ok(())
}
