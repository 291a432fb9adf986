//! Arnold standard surface network
//!
//! Every sampler is an `arnold:image` with the full set of image defaults.
//! Scalar maps pass through `arnold:range`, base color through
//! `arnold:color_correct`. Normal and bump maps meet in one shared
//! `arnold:bump2d` that drives the surface normal.

use super::{node_id, supported_input, NodeRole, ShaderNetworkBuilder};
use crate::assets::{MaterialDescriptor, TextureSlot};
use crate::config::DisplacementMode;
use crate::material::{ConstantValue, LogicalInputs, TextureRef};
use crate::shading::{
    AttributeValue, Backend, GraphError, ShaderGraph, ShaderNode, ValueType, DISPLACEMENT_OUTPUT, SURFACE_OUTPUT,
};

const PREFIX: &str = "arnold";
const SURFACE_NODE: &str = "arnold_standard_surface1";
const TRANSMISSION: f32 = 0.9;

fn surface_defaults() -> Vec<(&'static str, AttributeValue)> {
    use AttributeValue::{Bool, Float, Float3};

    vec![
        ("base", Float(1.0)),
        ("base_color", Float3([0.8; 3])),
        ("metalness", Float(0.0)),
        ("specular", Float(1.0)),
        ("specular_color", Float3([1.0; 3])),
        ("specular_roughness", Float(0.2)),
        ("specular_IOR", Float(1.5)),
        ("coat", Float(0.0)),
        ("coat_roughness", Float(0.1)),
        ("coat_IOR", Float(1.5)),
        ("emission", Float(0.0)),
        ("emission_color", Float3([1.0; 3])),
        ("transmission", Float(0.0)),
        ("thin_walled", Bool(false)),
        ("opacity", Float3([1.0; 3])),
    ]
}

fn image_defaults() -> Vec<(&'static str, AttributeValue)> {
    use AttributeValue::{Bool, Float, Float2, Float3, Float4, Int, String, Token};

    vec![
        ("color_space", String("auto".into())),
        ("filter", Token("smart_bicubic".into())),
        ("ignore_missing_textures", Bool(false)),
        ("mipmap_bias", Int(0)),
        ("missing_texture_color", Float4([0.0; 4])),
        ("multiply", Float3([1.0; 3])),
        ("offset", Float3([0.0; 3])),
        ("sflip", Bool(false)),
        ("tflip", Bool(false)),
        ("single_channel", Bool(false)),
        ("soffset", Float(0.0)),
        ("toffset", Float(0.0)),
        ("sscale", Float(1.0)),
        ("tscale", Float(1.0)),
        ("start_channel", Int(0)),
        ("swap_st", Bool(false)),
        ("swrap", Token("periodic".into())),
        ("twrap", Token("periodic".into())),
        ("uvcoords", Float2([0.0; 2])),
        ("uvset", String(std::string::String::new())),
    ]
}

fn range_defaults() -> Vec<(&'static str, AttributeValue)> {
    use AttributeValue::{Bool, Float};

    vec![
        ("bias", Float(0.5)),
        ("contrast", Float(1.0)),
        ("contrast_pivot", Float(0.5)),
        ("gain", Float(0.5)),
        ("input_min", Float(0.0)),
        ("input_max", Float(1.0)),
        ("output_min", Float(0.0)),
        ("output_max", Float(1.0)),
        ("smoothstep", Bool(false)),
    ]
}

fn color_correct_defaults() -> Vec<(&'static str, AttributeValue)> {
    use AttributeValue::{Float, Float3};

    vec![
        ("add", Float3([0.0; 3])),
        ("contrast", Float(1.0)),
        ("exposure", Float(0.0)),
        ("gamma", Float(1.0)),
        ("hue_shift", Float(0.0)),
    ]
}

fn normal_map_defaults() -> Vec<(&'static str, AttributeValue)> {
    use AttributeValue::{Bool, Float, Token};

    vec![
        ("color_to_signed", Bool(true)),
        ("invert_x", Bool(false)),
        ("invert_y", Bool(false)),
        ("invert_z", Bool(false)),
        ("order", Token("XYZ".into())),
        ("strength", Float(1.0)),
        ("tangent_space", Bool(true)),
    ]
}

fn node_with(id: &str, kind: &str, outputs: &[&str], defaults: Vec<(&'static str, AttributeValue)>) -> ShaderNode {
    let mut node = ShaderNode::new(id, kind, outputs);
    for (name, value) in defaults {
        node.set_value(name, value);
    }
    node
}

/// Builds Arnold standard surface networks
#[derive(Debug, Clone, Copy)]
pub struct ArnoldBuilder {
    displacement_mode: DisplacementMode,
}

impl ArnoldBuilder {
    /// Create a builder that consumes height maps as `displacement_mode`
    pub const fn new(displacement_mode: DisplacementMode) -> Self {
        Self { displacement_mode }
    }

    fn add_image(graph: &mut ShaderGraph, texture: &TextureRef) -> Result<String, GraphError> {
        let id = node_id(PREFIX, Some(texture.slot), NodeRole::Texture);
        let mut node = node_with(&id, "arnold:image", &["rgba", "rgb", "r", "vector"], image_defaults());
        node.set_value("filename", AttributeValue::Asset(texture.asset.clone()));
        graph.add_node(node)?;
        Ok(id)
    }

    fn add_range(graph: &mut ShaderGraph, slot: TextureSlot, image: &str) -> Result<String, GraphError> {
        let id = node_id(PREFIX, Some(slot), NodeRole::Range);
        graph.add_node(node_with(&id, "arnold:range", &["r", "rgb"], range_defaults()))?;
        graph.connect(image, "rgba", &id, "input", ValueType::Float4)?;
        Ok(id)
    }

    /// Shared bump node, hooked into the surface normal on first use
    fn bump(graph: &mut ShaderGraph) -> Result<String, GraphError> {
        let id = node_id(PREFIX, None, NodeRole::Bump);
        if graph.node(&id).is_none() {
            graph.add_node(
                ShaderNode::new(id.as_str(), "arnold:bump2d", &["vector"])
                    .with_value("bump_height", AttributeValue::Float(1.0)),
            )?;
            graph.connect(&id, "vector", SURFACE_NODE, "normal", ValueType::Float3)?;
        }
        Ok(id)
    }

    fn wire_texture(
        self,
        graph: &mut ShaderGraph,
        input: &str,
        texture: &TextureRef,
        transmissive: bool,
    ) -> Result<(), GraphError> {
        let slot = texture.slot;
        if slot == TextureSlot::Metalness && transmissive {
            log::debug!("Skipping metalness texture on transmissive material '{}'", graph.material);
            return Ok(());
        }

        let image = Self::add_image(graph, texture)?;
        match slot {
            TextureSlot::BaseColor => {
                let id = node_id(PREFIX, Some(slot), NodeRole::ColorCorrect);
                graph.add_node(node_with(&id, "arnold:color_correct", &["rgb"], color_correct_defaults()))?;
                graph.connect(&image, "rgba", &id, "input", ValueType::Float4)?;
                graph.connect(&id, "rgb", SURFACE_NODE, input, ValueType::Float3)
            }
            TextureSlot::Metalness | TextureSlot::Roughness => {
                let range = Self::add_range(graph, slot, &image)?;
                graph.connect(&range, "r", SURFACE_NODE, input, ValueType::Float)
            }
            TextureSlot::Opacity => {
                let range = Self::add_range(graph, slot, &image)?;
                graph.connect(&range, "rgb", SURFACE_NODE, input, ValueType::Float3)
            }
            TextureSlot::Normal => {
                let id = node_id(PREFIX, None, NodeRole::NormalMap);
                graph.add_node(node_with(&id, "arnold:normal_map", &["vector"], normal_map_defaults()))?;
                graph.connect(&image, "vector", &id, "input", ValueType::Float3)?;
                let bump = Self::bump(graph)?;
                graph.connect(&id, "vector", &bump, "normal", ValueType::Float3)
            }
            TextureSlot::Displacement => {
                let range = Self::add_range(graph, slot, &image)?;
                self.wire_height(graph, input, &range)
            }
            TextureSlot::Occlusion => Ok(()),
        }
    }

    fn wire_height(self, graph: &mut ShaderGraph, input: &str, range: &str) -> Result<(), GraphError> {
        match self.displacement_mode {
            DisplacementMode::Bump => {
                let bump = Self::bump(graph)?;
                graph.connect(range, "r", &bump, "bump_map", ValueType::Float)
            }
            DisplacementMode::Displacement => {
                let id = node_id(PREFIX, None, NodeRole::Displacement);
                graph.add_node(ShaderNode::new(id.as_str(), "arnold:displacement", &["out"]))?;
                graph.connect(range, "r", &id, input, ValueType::Float)?;
                graph.set_output(DISPLACEMENT_OUTPUT, &id, "out", ValueType::Float)
            }
        }
    }
}

impl ShaderNetworkBuilder for ArnoldBuilder {
    fn backend(&self) -> Backend {
        Backend::Arnold
    }

    fn build(&self, material: &MaterialDescriptor, inputs: &LogicalInputs) -> Result<ShaderGraph, GraphError> {
        let transmissive = material.is_transmissive();

        let mut graph = ShaderGraph::new(Backend::Arnold, material.name.as_str());
        graph.add_node(node_with(SURFACE_NODE, "arnold:standard_surface", &["surface"], surface_defaults()))?;
        graph.set_output(SURFACE_OUTPUT, SURFACE_NODE, "surface", ValueType::Token)?;

        for (slot, value) in inputs.constants() {
            let Some(input) = Backend::Arnold.input_name(slot) else {
                continue;
            };
            let value = match (slot, value) {
                (TextureSlot::Opacity, ConstantValue::Float(v)) => AttributeValue::Float3([v; 3]),
                (_, ConstantValue::Float(v)) => AttributeValue::Float(v),
                (_, ConstantValue::Color(rgb)) => AttributeValue::Float3(rgb),
            };
            graph.set_value(SURFACE_NODE, input, value)?;
        }

        for texture in inputs.textures() {
            let Some(input) = supported_input(Backend::Arnold, &material.name, texture.slot) else {
                continue;
            };
            self.wire_texture(&mut graph, input, texture, transmissive)?;
        }

        if transmissive {
            graph.set_value(SURFACE_NODE, "transmission", AttributeValue::Float(TRANSMISSION))?;
            graph.set_value(SURFACE_NODE, "thin_walled", AttributeValue::Bool(true))?;
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{asset, full_material, textured};
    use super::super::{build_material_graph, BuildOptions};
    use super::*;

    fn build(material: &MaterialDescriptor, displacement_mode: DisplacementMode) -> ShaderGraph {
        build_material_graph(material, Backend::Arnold, None, BuildOptions { displacement_mode }).unwrap()
    }

    #[test]
    fn test_bump_mode_routes_height_into_bump() {
        let graph = build(&textured("Body", &[TextureSlot::Displacement]), DisplacementMode::Bump);

        let bump = graph.node("arnold_Bump2d").unwrap();
        assert_eq!(bump.source("bump_map").unwrap().node, "arnold_displacementRange");
        assert_eq!(graph.node(SURFACE_NODE).unwrap().source("normal").unwrap().node, "arnold_Bump2d");
        assert!(graph.output(DISPLACEMENT_OUTPUT).is_none());
        assert!(graph.node("arnold_Displacement").is_none());
    }

    #[test]
    fn test_displacement_mode_exposes_output() {
        let graph = build(&textured("Body", &[TextureSlot::Displacement]), DisplacementMode::Displacement);

        let displacement = graph.node("arnold_Displacement").unwrap();
        assert_eq!(displacement.source("height").unwrap().node, "arnold_displacementRange");
        assert_eq!(graph.output(DISPLACEMENT_OUTPUT).unwrap().source.node, "arnold_Displacement");
        assert!(graph.node("arnold_Bump2d").is_none());
    }

    #[test]
    fn test_normal_and_bump_share_one_node() {
        let graph = build(
            &textured("Body", &[TextureSlot::Normal, TextureSlot::Displacement]),
            DisplacementMode::Bump,
        );

        assert_eq!(graph.nodes_of_kind("arnold:bump2d").count(), 1);
        let bump = graph.node("arnold_Bump2d").unwrap();
        assert_eq!(bump.source("normal").unwrap().node, "arnold_NormalMap");
        assert_eq!(bump.source("bump_map").unwrap().node, "arnold_displacementRange");
    }

    #[test]
    fn test_image_nodes_carry_defaults() {
        let graph = build(&textured("Body", &[TextureSlot::Roughness]), DisplacementMode::Bump);
        let image = graph.node("arnold_roughnessTexture").unwrap();

        assert_eq!(image.kind, "arnold:image");
        assert_eq!(image.value("swrap"), Some(&AttributeValue::token("periodic")));
        assert_eq!(image.value("filter"), Some(&AttributeValue::token("smart_bicubic")));
        assert!(asset(&graph, "arnold_roughnessTexture", "filename").source.ends_with("Body_roughness.png"));

        let surface = graph.node(SURFACE_NODE).unwrap();
        let roughness = surface.source("specular_roughness").unwrap();
        assert_eq!((roughness.node.as_str(), roughness.port.as_str()), ("arnold_roughnessRange", "r"));
    }

    #[test]
    fn test_opacity_constant_is_triple() {
        let graph = build(&textured("Body", &[]), DisplacementMode::Bump);
        let surface = graph.node(SURFACE_NODE).unwrap();
        assert_eq!(surface.value("opacity"), Some(&AttributeValue::Float3([1.0; 3])));
        assert_eq!(surface.value("specular_roughness"), Some(&AttributeValue::Float(0.5)));
    }

    #[test]
    fn test_glass_skips_metalness() {
        let graph = build(&full_material("Glass"), DisplacementMode::Bump);
        let surface = graph.node(SURFACE_NODE).unwrap();

        assert!(graph.node("arnold_metalnessTexture").is_none());
        assert_eq!(surface.value("transmission"), Some(&AttributeValue::Float(TRANSMISSION)));
        assert_eq!(surface.value("thin_walled"), Some(&AttributeValue::Bool(true)));
    }
}
