//! ONNX Protocol Buffer types
//!
//! The ONNX schema (IR version 11) declared with `prost` derives and the
//! official field tags. Every message and field of `onnx.proto` is present,
//! so a model decoded here re-encodes without losing subgraphs, metadata,
//! functions or external-data references.
//!
//! Additional extension methods are provided in the `extensions` submodule.

/// ONNX message definitions
#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod onnx {
    /// Named attribute of a node or function
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AttributeProto {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "21")]
        pub ref_attr_name: ::prost::alloc::string::String,
        #[prost(string, tag = "13")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(enumeration = "attribute_proto::AttributeType", tag = "20")]
        pub r#type: i32,
        #[prost(float, tag = "2")]
        pub f: f32,
        #[prost(int64, tag = "3")]
        pub i: i64,
        #[prost(bytes = "vec", tag = "4")]
        pub s: ::prost::alloc::vec::Vec<u8>,
        #[prost(message, optional, tag = "5")]
        pub t: ::core::option::Option<TensorProto>,
        #[prost(message, optional, tag = "6")]
        pub g: ::core::option::Option<GraphProto>,
        #[prost(message, optional, tag = "22")]
        pub sparse_tensor: ::core::option::Option<SparseTensorProto>,
        #[prost(message, optional, tag = "14")]
        pub tp: ::core::option::Option<TypeProto>,
        #[prost(float, repeated, packed = "false", tag = "7")]
        pub floats: ::prost::alloc::vec::Vec<f32>,
        #[prost(int64, repeated, packed = "false", tag = "8")]
        pub ints: ::prost::alloc::vec::Vec<i64>,
        #[prost(bytes = "vec", repeated, tag = "9")]
        pub strings: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
        #[prost(message, repeated, tag = "10")]
        pub tensors: ::prost::alloc::vec::Vec<TensorProto>,
        #[prost(message, repeated, tag = "11")]
        pub graphs: ::prost::alloc::vec::Vec<GraphProto>,
        #[prost(message, repeated, tag = "23")]
        pub sparse_tensors: ::prost::alloc::vec::Vec<SparseTensorProto>,
        #[prost(message, repeated, tag = "15")]
        pub type_protos: ::prost::alloc::vec::Vec<TypeProto>,
    }

    /// Nested types for `AttributeProto`
    pub mod attribute_proto {
        /// Attribute payload kind
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum AttributeType {
            Undefined = 0,
            Float = 1,
            Int = 2,
            String = 3,
            Tensor = 4,
            Graph = 5,
            SparseTensor = 11,
            TypeProto = 13,
            Floats = 6,
            Ints = 7,
            Strings = 8,
            Tensors = 9,
            Graphs = 10,
            SparseTensors = 12,
            TypeProtos = 14,
        }
    }

    /// Name and type of a graph value
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ValueInfoProto {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub r#type: ::core::option::Option<TypeProto>,
        #[prost(string, tag = "3")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "4")]
        pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
    }

    /// Operator instance
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NodeProto {
        #[prost(string, repeated, tag = "1")]
        pub input: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(string, repeated, tag = "2")]
        pub output: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(string, tag = "3")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub op_type: ::prost::alloc::string::String,
        #[prost(string, tag = "7")]
        pub domain: ::prost::alloc::string::String,
        #[prost(string, tag = "8")]
        pub overload: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "5")]
        pub attribute: ::prost::alloc::vec::Vec<AttributeProto>,
        #[prost(string, tag = "6")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "9")]
        pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
        #[prost(message, repeated, tag = "10")]
        pub device_configurations: ::prost::alloc::vec::Vec<NodeDeviceConfigurationProto>,
    }

    /// Key with a list of integer values
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct IntIntListEntryProto {
        #[prost(int64, tag = "1")]
        pub key: i64,
        #[prost(int64, repeated, packed = "false", tag = "2")]
        pub value: ::prost::alloc::vec::Vec<i64>,
    }

    /// Per-node device placement
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NodeDeviceConfigurationProto {
        #[prost(string, tag = "1")]
        pub configuration_id: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "2")]
        pub sharding_spec: ::prost::alloc::vec::Vec<ShardingSpecProto>,
        #[prost(int32, tag = "3")]
        pub pipeline_stage: i32,
    }

    /// Sharding of one tensor across devices
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ShardingSpecProto {
        #[prost(string, tag = "1")]
        pub tensor_name: ::prost::alloc::string::String,
        #[prost(int64, repeated, packed = "false", tag = "2")]
        pub device: ::prost::alloc::vec::Vec<i64>,
        #[prost(message, repeated, tag = "3")]
        pub index_to_device_group_map: ::prost::alloc::vec::Vec<IntIntListEntryProto>,
        #[prost(message, repeated, tag = "4")]
        pub sharded_dim: ::prost::alloc::vec::Vec<ShardedDimProto>,
    }

    /// Sharding along one axis
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ShardedDimProto {
        #[prost(int64, tag = "1")]
        pub axis: i64,
        #[prost(message, repeated, tag = "2")]
        pub simple_sharding: ::prost::alloc::vec::Vec<SimpleShardedDimProto>,
    }

    /// Even split of a dimension into shards
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SimpleShardedDimProto {
        #[prost(int64, tag = "3")]
        pub num_shards: i64,
        #[prost(oneof = "simple_sharded_dim_proto::Dim", tags = "1, 2")]
        pub dim: ::core::option::Option<simple_sharded_dim_proto::Dim>,
    }

    /// Nested types for `SimpleShardedDimProto`
    pub mod simple_sharded_dim_proto {
        /// Static or symbolic dimension size
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Dim {
            #[prost(int64, tag = "1")]
            DimValue(i64),
            #[prost(string, tag = "2")]
            DimParam(::prost::alloc::string::String),
        }
    }

    /// Training algorithm attached to a model
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TrainingInfoProto {
        #[prost(message, optional, tag = "1")]
        pub initialization: ::core::option::Option<GraphProto>,
        #[prost(message, optional, tag = "2")]
        pub algorithm: ::core::option::Option<GraphProto>,
        #[prost(message, repeated, tag = "3")]
        pub initialization_binding: ::prost::alloc::vec::Vec<StringStringEntryProto>,
        #[prost(message, repeated, tag = "4")]
        pub update_binding: ::prost::alloc::vec::Vec<StringStringEntryProto>,
    }

    /// Top-level ONNX model container
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ModelProto {
        #[prost(int64, tag = "1")]
        pub ir_version: i64,
        #[prost(message, repeated, tag = "8")]
        pub opset_import: ::prost::alloc::vec::Vec<OperatorSetIdProto>,
        #[prost(string, tag = "2")]
        pub producer_name: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub producer_version: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub domain: ::prost::alloc::string::String,
        #[prost(int64, tag = "5")]
        pub model_version: i64,
        #[prost(string, tag = "6")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "7")]
        pub graph: ::core::option::Option<GraphProto>,
        #[prost(message, repeated, tag = "14")]
        pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
        #[prost(message, repeated, tag = "20")]
        pub training_info: ::prost::alloc::vec::Vec<TrainingInfoProto>,
        #[prost(message, repeated, tag = "25")]
        pub functions: ::prost::alloc::vec::Vec<FunctionProto>,
        #[prost(message, repeated, tag = "26")]
        pub configuration: ::prost::alloc::vec::Vec<DeviceConfigurationProto>,
    }

    /// Named device set a model can be placed on
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DeviceConfigurationProto {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(int32, tag = "2")]
        pub num_devices: i32,
        #[prost(string, repeated, tag = "3")]
        pub device: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    }

    /// String key/value pair
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StringStringEntryProto {
        #[prost(string, tag = "1")]
        pub key: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub value: ::prost::alloc::string::String,
    }

    /// Quantization parameters of one tensor
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorAnnotation {
        #[prost(string, tag = "1")]
        pub tensor_name: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "2")]
        pub quant_parameter_tensor_names: ::prost::alloc::vec::Vec<StringStringEntryProto>,
    }

    /// Computation graph
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GraphProto {
        #[prost(message, repeated, tag = "1")]
        pub node: ::prost::alloc::vec::Vec<NodeProto>,
        #[prost(string, tag = "2")]
        pub name: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "5")]
        pub initializer: ::prost::alloc::vec::Vec<TensorProto>,
        #[prost(message, repeated, tag = "15")]
        pub sparse_initializer: ::prost::alloc::vec::Vec<SparseTensorProto>,
        #[prost(string, tag = "10")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "11")]
        pub input: ::prost::alloc::vec::Vec<ValueInfoProto>,
        #[prost(message, repeated, tag = "12")]
        pub output: ::prost::alloc::vec::Vec<ValueInfoProto>,
        #[prost(message, repeated, tag = "13")]
        pub value_info: ::prost::alloc::vec::Vec<ValueInfoProto>,
        #[prost(message, repeated, tag = "14")]
        pub quantization_annotation: ::prost::alloc::vec::Vec<TensorAnnotation>,
        #[prost(message, repeated, tag = "16")]
        pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
    }

    /// Constant tensor
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorProto {
        #[prost(int64, repeated, packed = "false", tag = "1")]
        pub dims: ::prost::alloc::vec::Vec<i64>,
        #[prost(int32, tag = "2")]
        pub data_type: i32,
        #[prost(message, optional, tag = "3")]
        pub segment: ::core::option::Option<tensor_proto::Segment>,
        #[prost(float, repeated, tag = "4")]
        pub float_data: ::prost::alloc::vec::Vec<f32>,
        #[prost(int32, repeated, tag = "5")]
        pub int32_data: ::prost::alloc::vec::Vec<i32>,
        #[prost(bytes = "vec", repeated, tag = "6")]
        pub string_data: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
        #[prost(int64, repeated, tag = "7")]
        pub int64_data: ::prost::alloc::vec::Vec<i64>,
        #[prost(string, tag = "8")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "12")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(bytes = "vec", tag = "9")]
        pub raw_data: ::prost::alloc::vec::Vec<u8>,
        #[prost(message, repeated, tag = "13")]
        pub external_data: ::prost::alloc::vec::Vec<StringStringEntryProto>,
        #[prost(enumeration = "tensor_proto::DataLocation", tag = "14")]
        pub data_location: i32,
        #[prost(double, repeated, tag = "10")]
        pub double_data: ::prost::alloc::vec::Vec<f64>,
        #[prost(uint64, repeated, tag = "11")]
        pub uint64_data: ::prost::alloc::vec::Vec<u64>,
        #[prost(message, repeated, tag = "16")]
        pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
    }

    /// Nested types for `TensorProto`
    pub mod tensor_proto {
        /// Slice of a tensor split across messages
        #[derive(Clone, Copy, PartialEq, ::prost::Message)]
        pub struct Segment {
            #[prost(int64, tag = "1")]
            pub begin: i64,
            #[prost(int64, tag = "2")]
            pub end: i64,
        }

        /// Element type of a tensor
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum DataType {
            Undefined = 0,
            Float = 1,
            Uint8 = 2,
            Int8 = 3,
            Uint16 = 4,
            Int16 = 5,
            Int32 = 6,
            Int64 = 7,
            String = 8,
            Bool = 9,
            Float16 = 10,
            Double = 11,
            Uint32 = 12,
            Uint64 = 13,
            Complex64 = 14,
            Complex128 = 15,
            Bfloat16 = 16,
            Float8e4m3fn = 17,
            Float8e4m3fnuz = 18,
            Float8e5m2 = 19,
            Float8e5m2fnuz = 20,
            Uint4 = 21,
            Int4 = 22,
            Float4e2m1 = 23,
            Float8e8m0 = 24,
        }

        /// Where the tensor payload is stored
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum DataLocation {
            Default = 0,
            External = 1,
        }
    }

    /// Sparse tensor in COO form
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SparseTensorProto {
        #[prost(message, optional, tag = "1")]
        pub values: ::core::option::Option<TensorProto>,
        #[prost(message, optional, tag = "2")]
        pub indices: ::core::option::Option<TensorProto>,
        #[prost(int64, repeated, packed = "false", tag = "3")]
        pub dims: ::prost::alloc::vec::Vec<i64>,
    }

    /// Tensor shape
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorShapeProto {
        #[prost(message, repeated, tag = "1")]
        pub dim: ::prost::alloc::vec::Vec<tensor_shape_proto::Dimension>,
    }

    /// Nested types for `TensorShapeProto`
    pub mod tensor_shape_proto {
        /// One shape dimension
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Dimension {
            #[prost(string, tag = "3")]
            pub denotation: ::prost::alloc::string::String,
            #[prost(oneof = "dimension::Value", tags = "1, 2")]
            pub value: ::core::option::Option<dimension::Value>,
        }

        /// Nested types for `Dimension`
        pub mod dimension {
            /// Static or symbolic dimension
            #[derive(Clone, PartialEq, ::prost::Oneof)]
            pub enum Value {
                #[prost(int64, tag = "1")]
                DimValue(i64),
                #[prost(string, tag = "2")]
                DimParam(::prost::alloc::string::String),
            }
        }
    }

    /// Value type
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TypeProto {
        #[prost(string, tag = "6")]
        pub denotation: ::prost::alloc::string::String,
        #[prost(oneof = "type_proto::Value", tags = "1, 4, 5, 9, 8, 7")]
        pub value: ::core::option::Option<type_proto::Value>,
    }

    /// Nested types for `TypeProto`
    pub mod type_proto {
        /// Tensor type
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Tensor {
            #[prost(int32, tag = "1")]
            pub elem_type: i32,
            #[prost(message, optional, tag = "2")]
            pub shape: ::core::option::Option<super::TensorShapeProto>,
        }

        /// Homogeneous sequence type
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Sequence {
            #[prost(message, optional, boxed, tag = "1")]
            pub elem_type: ::core::option::Option<::prost::alloc::boxed::Box<super::TypeProto>>,
        }

        /// Map type
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Map {
            #[prost(int32, tag = "1")]
            pub key_type: i32,
            #[prost(message, optional, boxed, tag = "2")]
            pub value_type: ::core::option::Option<::prost::alloc::boxed::Box<super::TypeProto>>,
        }

        /// Optional type
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Optional {
            #[prost(message, optional, boxed, tag = "1")]
            pub elem_type: ::core::option::Option<::prost::alloc::boxed::Box<super::TypeProto>>,
        }

        /// Sparse tensor type
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct SparseTensor {
            #[prost(int32, tag = "1")]
            pub elem_type: i32,
            #[prost(message, optional, tag = "2")]
            pub shape: ::core::option::Option<super::TensorShapeProto>,
        }

        /// Opaque type
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Opaque {
            #[prost(string, tag = "1")]
            pub domain: ::prost::alloc::string::String,
            #[prost(string, tag = "2")]
            pub name: ::prost::alloc::string::String,
        }

        /// Type variants
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Value {
            #[prost(message, tag = "1")]
            TensorType(Tensor),
            #[prost(message, tag = "4")]
            SequenceType(Sequence),
            #[prost(message, tag = "5")]
            MapType(Map),
            #[prost(message, tag = "9")]
            OptionalType(Optional),
            #[prost(message, tag = "8")]
            SparseTensorType(SparseTensor),
            #[prost(message, tag = "7")]
            OpaqueType(Opaque),
        }
    }

    /// Operator set import
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OperatorSetIdProto {
        #[prost(string, tag = "1")]
        pub domain: ::prost::alloc::string::String,
        #[prost(int64, tag = "2")]
        pub version: i64,
    }

    /// Model-local function
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FunctionProto {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, repeated, tag = "4")]
        pub input: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(string, repeated, tag = "5")]
        pub output: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(string, repeated, tag = "6")]
        pub attribute: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(message, repeated, tag = "11")]
        pub attribute_proto: ::prost::alloc::vec::Vec<AttributeProto>,
        #[prost(message, repeated, tag = "7")]
        pub node: ::prost::alloc::vec::Vec<NodeProto>,
        #[prost(string, tag = "8")]
        pub doc_string: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "9")]
        pub opset_import: ::prost::alloc::vec::Vec<OperatorSetIdProto>,
        #[prost(string, tag = "10")]
        pub domain: ::prost::alloc::string::String,
        #[prost(string, tag = "13")]
        pub overload: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "12")]
        pub value_info: ::prost::alloc::vec::Vec<ValueInfoProto>,
        #[prost(message, repeated, tag = "14")]
        pub metadata_props: ::prost::alloc::vec::Vec<StringStringEntryProto>,
    }
}

// Re-export commonly used types at module level
pub use onnx::{
    AttributeProto, FunctionProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    SparseTensorProto, StringStringEntryProto, TensorAnnotation, TensorProto, TensorShapeProto,
    TrainingInfoProto, TypeProto, ValueInfoProto,
};

// Re-export submodules for nested types
pub use onnx::attribute_proto;
pub use onnx::tensor_proto;
pub use onnx::tensor_shape_proto;
pub use onnx::type_proto;

/// Extension methods for ONNX protobuf types
pub mod extensions;
