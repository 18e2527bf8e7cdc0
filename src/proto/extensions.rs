//! Extension methods for ONNX protobuf types
//!
//! Provides convenient helper methods for working with ONNX protobuf types.

use super::onnx::*;

/// Op type of nodes that produce a compile-time constant
pub const CONSTANT_OP: &str = "Constant";

// ============================================================================
// NodeProto extensions
// ============================================================================

impl NodeProto {
    /// Check if this node produces a compile-time constant
    ///
    /// Constant nodes are never matched or followed during pattern search;
    /// they are detached together with the nodes that consume them.
    pub fn is_constant(&self) -> bool {
        self.op_type == CONSTANT_OP
    }

    /// Get attribute by name
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeProto> {
        self.attribute.iter().find(|attr| attr.name == name)
    }

    /// Get integer attribute value with default
    pub fn get_attribute_int(&self, name: &str, default: i64) -> i64 {
        self.get_attribute(name).map(|a| a.i).unwrap_or(default)
    }

    /// Short `name(op_type)` label used in diagnostics
    pub fn label(&self) -> String {
        format!("{}({})", self.name, self.op_type)
    }

    /// Replace every input equal to `from` with `to`, returning the count
    pub fn rename_input(&mut self, from: &str, to: &str) -> usize {
        rename_in(&mut self.input, from, to)
    }

    /// Replace every output equal to `from` with `to`, returning the count
    pub fn rename_output(&mut self, from: &str, to: &str) -> usize {
        rename_in(&mut self.output, from, to)
    }

    /// Add an attribute (builder style)
    pub fn with_attribute(mut self, attr: AttributeProto) -> Self {
        self.attribute.push(attr);
        self
    }
}

fn rename_in(names: &mut [String], from: &str, to: &str) -> usize {
    let mut count = 0;
    for name in names.iter_mut().filter(|n| n.as_str() == from) {
        *name = to.to_string();
        count += 1;
    }
    count
}

// ============================================================================
// ValueInfoProto extensions
// ============================================================================

impl ValueInfoProto {
    /// Get the shape dimensions if available
    pub fn get_shape(&self) -> Option<Vec<i64>> {
        self.r#type.as_ref().and_then(|t| {
            t.value.as_ref().and_then(|v| match v {
                type_proto::Value::TensorType(tensor) => tensor.shape.as_ref().map(|s| {
                    s.dim
                        .iter()
                        .map(|d| match &d.value {
                            Some(tensor_shape_proto::dimension::Value::DimValue(v)) => *v,
                            Some(tensor_shape_proto::dimension::Value::DimParam(_)) => -1,
                            None => -1,
                        })
                        .collect()
                }),
                _ => None,
            })
        })
    }
}

// ============================================================================
// TensorProto extensions
// ============================================================================

impl TensorProto {
    /// Get the total number of elements
    pub fn num_elements(&self) -> usize {
        self.dims.iter().map(|&d| d.max(0) as usize).product()
    }
}

// ============================================================================
// AttributeProto extensions
// ============================================================================

impl AttributeProto {
    /// Create a new integer attribute
    pub fn new_int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            i: value,
            r#type: attribute_proto::AttributeType::Int as i32,
            ..Default::default()
        }
    }

    /// Create a new tensor attribute
    pub fn new_tensor(name: &str, value: TensorProto) -> Self {
        Self {
            name: name.to_string(),
            t: Some(value),
            r#type: attribute_proto::AttributeType::Tensor as i32,
            ..Default::default()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Create a new ValueInfoProto for a tensor
pub fn make_tensor_value_info(name: &str, elem_type: i32, shape: &[i64]) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type,
                shape: Some(TensorShapeProto {
                    dim: shape
                        .iter()
                        .map(|&d| tensor_shape_proto::Dimension {
                            value: Some(tensor_shape_proto::dimension::Value::DimValue(d)),
                            denotation: String::new(),
                        })
                        .collect(),
                }),
            })),
            denotation: String::new(),
        }),
        ..Default::default()
    }
}

/// Create a ValueInfoProto carrying only a name
pub fn make_value_info(name: &str) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        ..Default::default()
    }
}

/// Create a new NodeProto
pub fn make_node(op_type: &str, inputs: &[&str], outputs: &[&str], name: &str) -> NodeProto {
    NodeProto {
        op_type: op_type.to_string(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        name: name.to_string(),
        ..Default::default()
    }
}

/// Create a float tensor with the given name, shape and values
pub fn make_tensor(name: &str, dims: &[i64], values: &[f32]) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: dims.to_vec(),
        data_type: tensor_proto::DataType::Float as i32,
        float_data: values.to_vec(),
        ..Default::default()
    }
}

/// Create a `Constant` node whose `value` attribute holds `tensor`
pub fn make_constant_node(output: &str, tensor: TensorProto, name: &str) -> NodeProto {
    make_node(CONSTANT_OP, &[], &[output], name)
        .with_attribute(AttributeProto::new_tensor("value", tensor))
}
