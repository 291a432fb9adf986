//! Backend-agnostic material model
//!
//! Turns parsed descriptors into logical channel inputs and holds the name
//! rules shared by the builders and the layering engine.

pub mod logical_inputs;
pub mod naming;

pub use logical_inputs::{
    apply_texture_format_override, build_logical_inputs, constant_default, AssetRef,
    ConstantValue, LogicalInput, LogicalInputs, TextureCopy, TextureRef, CONSTANT_DEFAULTS,
};
pub use naming::{is_transmissive, normalize_component_name, sanitize_identifier, NamingConvention};
