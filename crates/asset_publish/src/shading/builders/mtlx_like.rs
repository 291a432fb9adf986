//! MaterialX networks for standard surface and OpenPBR
//!
//! Both surfaces share the node library and the wiring: base color goes
//! through a color correction, metalness and roughness through a range
//! remap, normals through `ND_normalmap`. They differ in the surface node,
//! its defaults and a few input names.

use super::{node_id, supported_input, NodeRole, ShaderNetworkBuilder};
use crate::assets::{MaterialDescriptor, TextureSlot};
use crate::material::{ConstantValue, LogicalInputs, TextureRef};
use crate::shading::{
    AttributeValue, Backend, GraphError, ShaderGraph, ShaderNode, ValueType, DISPLACEMENT_OUTPUT, SURFACE_OUTPUT,
};

/// Transmission weight authored on glass materials
const TRANSMISSION: f32 = 0.9;

/// MaterialX surface shader flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtlxSurface {
    /// `ND_standard_surface_surfaceshader`
    StandardSurface,
    /// `ND_open_pbr_surface_surfaceshader`
    OpenPbr,
}

impl MtlxSurface {
    const fn backend(self) -> Backend {
        match self {
            Self::StandardSurface => Backend::StandardSurface,
            Self::OpenPbr => Backend::OpenPbr,
        }
    }

    const fn surface_kind(self) -> &'static str {
        match self {
            Self::StandardSurface => "ND_standard_surface_surfaceshader",
            Self::OpenPbr => "ND_open_pbr_surface_surfaceshader",
        }
    }

    const fn surface_port(self) -> &'static str {
        match self {
            Self::StandardSurface => "surface",
            Self::OpenPbr => "out",
        }
    }

    fn surface_id(self) -> String {
        match self {
            Self::StandardSurface => "mtlx_mtlxstandard_surface1".to_string(),
            Self::OpenPbr => "openpbr_surface1".to_string(),
        }
    }

    fn defaults(self) -> Vec<(&'static str, AttributeValue)> {
        use AttributeValue::{Bool, Color3, Float, Int};

        match self {
            Self::StandardSurface => vec![
                ("base", Float(1.0)),
                ("base_color", Color3([0.8; 3])),
                ("coat", Float(0.0)),
                ("coat_roughness", Float(0.1)),
                ("emission", Float(0.0)),
                ("emission_color", Color3([1.0; 3])),
                ("metalness", Float(0.0)),
                ("specular", Float(1.0)),
                ("specular_color", Color3([1.0; 3])),
                ("specular_IOR", Float(1.5)),
                ("specular_roughness", Float(0.2)),
                ("transmission", Float(0.0)),
                ("thin_walled", Int(0)),
                ("opacity", Color3([1.0; 3])),
            ],
            Self::OpenPbr => vec![
                ("base_weight", Float(1.0)),
                ("base_color", Color3([0.8; 3])),
                ("base_diffuse_roughness", Float(0.0)),
                ("base_metalness", Float(0.0)),
                ("specular_weight", Float(1.0)),
                ("specular_color", Color3([1.0; 3])),
                ("specular_ior", Float(1.5)),
                ("specular_roughness", Float(0.2)),
                ("coat_weight", Float(0.0)),
                ("coat_color", Color3([1.0; 3])),
                ("coat_roughness", Float(0.1)),
                ("coat_ior", Float(1.6)),
                ("emission_color", Color3([1.0; 3])),
                ("emission_luminance", Float(0.0)),
                ("geometry_opacity", Float(1.0)),
                ("geometry_thin_walled", Bool(false)),
            ],
        }
    }

    fn transmission(self) -> [(&'static str, AttributeValue); 2] {
        match self {
            Self::StandardSurface => [
                ("transmission", AttributeValue::Float(TRANSMISSION)),
                ("thin_walled", AttributeValue::Int(1)),
            ],
            Self::OpenPbr => [
                ("transmission_weight", AttributeValue::Float(TRANSMISSION)),
                ("geometry_thin_walled", AttributeValue::Bool(true)),
            ],
        }
    }

    /// Image node signature and the value type its `out` carries
    const fn image_signature(self, slot: TextureSlot) -> (&'static str, ValueType) {
        match slot {
            TextureSlot::BaseColor => ("color3", ValueType::Color3),
            TextureSlot::Normal => ("vector3", ValueType::Vector3),
            TextureSlot::Opacity => match self {
                Self::StandardSurface => ("color3", ValueType::Color3),
                Self::OpenPbr => ("float", ValueType::Float),
            },
            TextureSlot::Metalness | TextureSlot::Roughness | TextureSlot::Occlusion | TextureSlot::Displacement => {
                ("float", ValueType::Float)
            }
        }
    }
}

/// Builds MaterialX surface networks
#[derive(Debug, Clone, Copy)]
pub struct MtlxLikeBuilder {
    surface: MtlxSurface,
}

impl MtlxLikeBuilder {
    /// Create a builder for a surface flavour
    pub const fn new(surface: MtlxSurface) -> Self {
        Self { surface }
    }

    fn prefix(self) -> &'static str {
        self.surface.backend().node_prefix()
    }

    fn add_image(self, graph: &mut ShaderGraph, texture: &TextureRef) -> Result<(String, ValueType), GraphError> {
        let id = node_id(self.prefix(), Some(texture.slot), NodeRole::Texture);
        let (signature, value_type) = self.surface.image_signature(texture.slot);
        graph.add_node(
            ShaderNode::new(id.as_str(), format!("ND_image_{signature}"), &["out"])
                .with_value("file", AttributeValue::Asset(texture.asset.clone())),
        )?;
        Ok((id, value_type))
    }

    /// Insert a single-input adapter between `image` and the surface
    fn add_adapter(
        self,
        graph: &mut ShaderGraph,
        slot: TextureSlot,
        role: NodeRole,
        kind: &str,
        image: &str,
        value_type: ValueType,
    ) -> Result<String, GraphError> {
        let id = node_id(self.prefix(), Some(slot), role);
        graph.add_node(ShaderNode::new(id.as_str(), kind, &["out"]))?;
        graph.connect(image, "out", &id, "in", value_type)?;
        Ok(id)
    }

    fn wire_texture(
        self,
        graph: &mut ShaderGraph,
        surface: &str,
        input: &str,
        texture: &TextureRef,
        transmissive: bool,
    ) -> Result<(), GraphError> {
        if texture.slot == TextureSlot::Metalness && transmissive {
            log::debug!("Skipping metalness texture on transmissive material '{}'", graph.material);
            return Ok(());
        }

        let (image, value_type) = self.add_image(graph, texture)?;
        match texture.slot {
            TextureSlot::BaseColor => {
                let cc = self.add_adapter(
                    graph,
                    texture.slot,
                    NodeRole::ColorCorrect,
                    "ND_colorcorrect_color3",
                    &image,
                    value_type,
                )?;
                graph.connect(&cc, "out", surface, input, ValueType::Color3)
            }
            TextureSlot::Metalness | TextureSlot::Roughness => {
                let range =
                    self.add_adapter(graph, texture.slot, NodeRole::Range, "ND_range_float", &image, value_type)?;
                graph.connect(&range, "out", surface, input, ValueType::Float)
            }
            TextureSlot::Normal => {
                let normal_map = node_id(self.prefix(), None, NodeRole::NormalMap);
                graph.add_node(ShaderNode::new(normal_map.as_str(), "ND_normalmap", &["out"]))?;
                graph.connect(&image, "out", &normal_map, "in", value_type)?;
                graph.connect(&normal_map, "out", surface, input, ValueType::Float3)
            }
            TextureSlot::Displacement => graph.set_output(DISPLACEMENT_OUTPUT, &image, "out", ValueType::Float),
            TextureSlot::Opacity | TextureSlot::Occlusion => graph.connect(&image, "out", surface, input, value_type),
        }
    }

    fn constant_value(self, slot: TextureSlot, value: ConstantValue) -> AttributeValue {
        match (value, slot, self.surface) {
            (ConstantValue::Float(v), TextureSlot::Opacity, MtlxSurface::StandardSurface) => {
                AttributeValue::Color3([v; 3])
            }
            (ConstantValue::Float(v), ..) => AttributeValue::Float(v),
            (ConstantValue::Color(rgb), ..) => AttributeValue::Color3(rgb),
        }
    }
}

impl ShaderNetworkBuilder for MtlxLikeBuilder {
    fn backend(&self) -> Backend {
        self.surface.backend()
    }

    fn build(&self, material: &MaterialDescriptor, inputs: &LogicalInputs) -> Result<ShaderGraph, GraphError> {
        let backend = self.surface.backend();
        let transmissive = material.is_transmissive();
        let surface = self.surface.surface_id();

        let mut graph = ShaderGraph::new(backend, material.name.as_str());
        let mut node = ShaderNode::new(surface.as_str(), self.surface.surface_kind(), &[self.surface.surface_port()]);
        for (name, value) in self.surface.defaults() {
            node.set_value(name, value);
        }
        graph.add_node(node)?;
        graph.set_output(SURFACE_OUTPUT, &surface, self.surface.surface_port(), ValueType::Token)?;

        for (slot, value) in inputs.constants() {
            if let Some(input) = backend.input_name(slot) {
                graph.set_value(&surface, input, self.constant_value(slot, value))?;
            }
        }

        for texture in inputs.textures() {
            let Some(input) = supported_input(backend, &material.name, texture.slot) else {
                continue;
            };
            self.wire_texture(&mut graph, &surface, input, texture, transmissive)?;
        }

        if transmissive {
            for (name, value) in self.surface.transmission() {
                graph.set_value(&surface, name, value)?;
            }
        }

        Ok(graph)
    }
}
