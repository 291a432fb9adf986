//! Shader network builders
//!
//! One builder per [`Backend`]. Every builder turns a material's logical
//! inputs into a [`ShaderGraph`] with a single `surface` graph output, and
//! every builder accepts a material with no textures at all: the result is
//! then just the surface node with its defaults.

mod arnold;
mod mtlx_like;
mod preview;

pub use arnold::ArnoldBuilder;
pub use mtlx_like::{MtlxLikeBuilder, MtlxSurface};
pub use preview::PreviewBuilder;

use super::{Backend, GraphError, ShaderGraph};
use crate::assets::{MaterialDescriptor, TextureSlot};
use crate::config::{DisplacementMode, ExportConfig};
use crate::material::{build_logical_inputs, LogicalInputs};

/// Options shared by all builders of one export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildOptions {
    /// How the Arnold backend consumes displacement maps
    pub displacement_mode: DisplacementMode,
}

impl BuildOptions {
    /// Builder options from an export configuration
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            displacement_mode: config.arnold_displacement_mode,
        }
    }
}

/// Compiles logical inputs into a backend-specific shader network
pub trait ShaderNetworkBuilder {
    /// Backend the builder targets
    fn backend(&self) -> Backend;

    /// Build the network for one material
    ///
    /// # Arguments
    /// * `material` - Parsed material
    /// * `inputs` - Logical inputs built for this builder's backend
    fn build(&self, material: &MaterialDescriptor, inputs: &LogicalInputs) -> Result<ShaderGraph, GraphError>;
}

/// Builder for a backend
pub fn builder_for(backend: Backend, options: BuildOptions) -> Box<dyn ShaderNetworkBuilder + Send + Sync> {
    match backend {
        Backend::Preview => Box::new(PreviewBuilder),
        Backend::StandardSurface => Box::new(MtlxLikeBuilder::new(MtlxSurface::StandardSurface)),
        Backend::OpenPbr => Box::new(MtlxLikeBuilder::new(MtlxSurface::OpenPbr)),
        Backend::Arnold => Box::new(ArnoldBuilder::new(options.displacement_mode)),
    }
}

/// Build one material for one backend, logical inputs included
pub fn build_material_graph(
    material: &MaterialDescriptor,
    backend: Backend,
    format_override: Option<&str>,
    options: BuildOptions,
) -> Result<ShaderGraph, GraphError> {
    let inputs = build_logical_inputs(material, backend, format_override);
    builder_for(backend, options).build(material, &inputs)
}

/// Role a node plays in a network, part of its id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Texture sampler
    Texture,
    /// Color correction after sampling
    ColorCorrect,
    /// Range remap after sampling
    Range,
    /// Tangent-space normal decoding
    NormalMap,
    /// Height to displacement
    Displacement,
    /// Bump and normal merge
    Bump,
}

impl NodeRole {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Texture => "Texture",
            Self::ColorCorrect => "ColorCorrect",
            Self::Range => "Range",
            Self::NormalMap => "NormalMap",
            Self::Displacement => "Displacement",
            Self::Bump => "Bump2d",
        }
    }
}

/// Deterministic node id from backend prefix, slot and role
///
/// Nodes that exist once per graph (normal map, bump, displacement) leave
/// the slot out: `mtlx_roughnessRange`, `arnold_NormalMap`.
pub fn node_id(prefix: &str, slot: Option<TextureSlot>, role: NodeRole) -> String {
    match slot {
        Some(slot) => format!("{prefix}_{}{}", slot.as_str(), role.suffix()),
        None => format!("{prefix}_{}", role.suffix()),
    }
}

/// Log and report whether a backend can wire a slot
fn supported_input(backend: Backend, material: &str, slot: TextureSlot) -> Option<&'static str> {
    let input = backend.input_name(slot);
    if input.is_none() {
        log::warn!("Texture slot '{slot}' of material '{material}' is not supported by {backend}");
    }
    input
}
