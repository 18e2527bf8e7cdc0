//! ONNX model writer
//!
//! Save ONNX models to files or bytes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use prost::Message;

use crate::error::OnnxResult;
use crate::proto::ModelProto;

/// Save an ONNX model to a file
///
/// # Example
///
/// ```ignore
/// use onnx_rewrite::io::save_model;
///
/// save_model(&model, "rewritten.onnx")?;
/// ```
pub fn save_model<P: AsRef<Path>>(model: &ModelProto, path: P) -> OnnxResult<()> {
    let path = path.as_ref();
    let bytes = model.encode_to_vec();

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote model file");
    Ok(())
}

/// Encode an ONNX model to bytes
pub fn model_to_bytes(model: &ModelProto) -> Vec<u8> {
    model.encode_to_vec()
}

/// Calculate the size of an encoded model in bytes
pub fn model_size(model: &ModelProto) -> usize {
    model.encoded_len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::reader::load_model;
    use crate::proto::extensions::{make_node, make_value_info};
    use crate::proto::GraphProto;

    fn create_test_model() -> ModelProto {
        ModelProto {
            ir_version: 8,
            producer_name: "test".to_string(),
            graph: Some(GraphProto {
                name: "test_graph".to_string(),
                node: vec![make_node("Relu", &["X"], &["Y"], "relu_0")],
                input: vec![make_value_info("X")],
                output: vec![make_value_info("Y")],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_model_size() {
        let model = create_test_model();
        assert_eq!(model_size(&model), model_to_bytes(&model).len());
    }

    #[test]
    fn test_save_and_load() {
        let model = create_test_model();
        let path = std::env::temp_dir().join(format!("onnx_rewrite_{}.onnx", std::process::id()));

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.ir_version, 8);
        assert_eq!(loaded.producer_name, "test");
        assert_eq!(loaded.graph.unwrap().node[0].op_type, "Relu");
    }
}
