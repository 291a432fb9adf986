//! Preview surface network
//!
//! Texture outputs connect straight into the surface. All samplers share a
//! single primvar reader for their `st` coordinates. Constant defaults are
//! not authored: the renderer's own defaults apply.

use super::{node_id, supported_input, NodeRole, ShaderNetworkBuilder};
use crate::assets::{MaterialDescriptor, TextureSlot};
use crate::material::{LogicalInputs, TextureRef};
use crate::shading::{AttributeValue, Backend, GraphError, ShaderGraph, ShaderNode, ValueType, SURFACE_OUTPUT};

const SURFACE_NODE: &str = "UsdPreviewSurface";
const READER_NODE: &str = "TexCoordReader";

/// Builds `UsdPreviewSurface` networks
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewBuilder;

impl PreviewBuilder {
    fn add_reader(graph: &mut ShaderGraph) {
        graph.add_shared_node(
            ShaderNode::new(READER_NODE, "UsdPrimvarReader_float2", &["result"])
                .with_value("varname", AttributeValue::token("st")),
        );
    }

    fn add_texture(graph: &mut ShaderGraph, texture: &TextureRef) -> Result<String, GraphError> {
        let id = node_id(Backend::Preview.node_prefix(), Some(texture.slot), NodeRole::Texture);
        let color_space = if texture.slot.is_color() { "sRGB" } else { "raw" };

        let mut node = ShaderNode::new(id.as_str(), "UsdUVTexture", &["r", "g", "b", "a", "rgb"])
            .with_value("file", AttributeValue::Asset(texture.asset.clone()))
            .with_value("wrapS", AttributeValue::token("repeat"))
            .with_value("wrapT", AttributeValue::token("repeat"))
            .with_value("sourceColorSpace", AttributeValue::token(color_space));
        if texture.slot == TextureSlot::Normal {
            node.set_value("scale", AttributeValue::Float4([2.0, 2.0, 2.0, 1.0]));
            node.set_value("bias", AttributeValue::Float4([-1.0, -1.0, -1.0, 0.0]));
        }
        graph.add_node(node)?;

        Self::add_reader(graph);
        graph.connect(READER_NODE, "result", &id, "st", ValueType::Float2)?;
        Ok(id)
    }
}

impl ShaderNetworkBuilder for PreviewBuilder {
    fn backend(&self) -> Backend {
        Backend::Preview
    }

    fn build(&self, material: &MaterialDescriptor, inputs: &LogicalInputs) -> Result<ShaderGraph, GraphError> {
        let mut graph = ShaderGraph::new(Backend::Preview, material.name.as_str());
        graph.add_node(ShaderNode::new(SURFACE_NODE, "UsdPreviewSurface", &["surface", "displacement"]))?;
        graph.set_output(SURFACE_OUTPUT, SURFACE_NODE, "surface", ValueType::Token)?;

        for texture in inputs.textures() {
            let Some(input) = supported_input(Backend::Preview, &material.name, texture.slot) else {
                continue;
            };
            let texture_node = Self::add_texture(&mut graph, texture)?;
            let (port, value_type) = match texture.slot {
                TextureSlot::BaseColor | TextureSlot::Normal => ("rgb", ValueType::Float3),
                _ => ("r", ValueType::Float),
            };
            graph.connect(&texture_node, port, SURFACE_NODE, input, value_type)?;
        }

        Ok(graph)
    }
}
