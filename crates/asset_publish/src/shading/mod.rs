//! Shader networks
//!
//! The graph model, the backend catalogue and one builder per backend.

pub mod backend;
pub mod builders;
pub mod graph;

pub use backend::Backend;
pub use builders::{build_material_graph, builder_for, BuildOptions, ShaderNetworkBuilder};
pub use graph::{
    AttributeValue, Connection, Endpoint, GraphError, GraphOutput, NodeInput, ShaderGraph, ShaderNode, ValueType,
    DISPLACEMENT_OUTPUT, SURFACE_OUTPUT,
};
