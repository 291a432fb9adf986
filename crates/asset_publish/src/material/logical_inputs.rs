//! Backend-agnostic material channels
//!
//! A [`LogicalInput`] is either a constant or a reference to a texture whose
//! final location is decided by the relocation map. Builders never compute
//! texture destinations themselves: they carry an [`AssetRef`] that the
//! layering engine resolves once every graph has been built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::{MaterialDescriptor, TextureSlot};
use crate::shading::Backend;

/// Constant channel value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// Scalar channel
    Float(f32),
    /// RGB channel
    Color([f32; 3]),
}

/// Constants substituted for absent slots
///
/// Slots not listed here are simply omitted when no texture exists.
pub const CONSTANT_DEFAULTS: [(TextureSlot, ConstantValue); 3] = [
    (TextureSlot::Metalness, ConstantValue::Float(0.0)),
    (TextureSlot::Roughness, ConstantValue::Float(0.5)),
    (TextureSlot::Opacity, ConstantValue::Float(1.0)),
];

/// Default for an absent slot, if the slot has one
pub fn constant_default(slot: TextureSlot) -> Option<ConstantValue> {
    CONSTANT_DEFAULTS
        .iter()
        .find(|(candidate, _)| *candidate == slot)
        .map(|(_, value)| *value)
}

/// Which physical copy of a source texture an asset reference points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureCopy {
    /// The relocated original under `textures/`
    Original,
    /// A resampled copy under `textures/previewTextures/` owned by one material
    Preview {
        /// Material the copy is named after
        material: String,
    },
}

/// Texture file reference carried by a sampling node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    /// Exported file on disk
    pub source: PathBuf,
    /// Original or preview copy
    pub copy: TextureCopy,
    /// Extension the backend reads instead of the source's
    pub format_override: Option<String>,
    /// Layer-relative path, filled in once relocation has run
    pub resolved_destination_path: Option<String>,
}

impl AssetRef {
    /// Reference the relocated original of `source`
    pub fn original(source: impl Into<PathBuf>, format_override: Option<&str>) -> Self {
        Self {
            source: source.into(),
            copy: TextureCopy::Original,
            format_override: format_override.map(str::to_string),
            resolved_destination_path: None,
        }
    }

    /// Reference the preview copy `material` gets of `source`
    pub fn preview(source: impl Into<PathBuf>, material: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            copy: TextureCopy::Preview {
                material: material.into(),
            },
            format_override: None,
            resolved_destination_path: None,
        }
    }

    /// Whether relocation has assigned a path
    pub fn is_resolved(&self) -> bool {
        self.resolved_destination_path.is_some()
    }
}

/// Texture-backed channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    /// Channel fed by the texture
    pub slot: TextureSlot,
    /// File the sampling node reads
    pub asset: AssetRef,
}

/// One material channel before backend encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalInput {
    /// Fixed value
    Constant(ConstantValue),
    /// Sampled from a texture
    TextureRef(TextureRef),
}

/// Slot to logical input mapping for one material and backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalInputs {
    inputs: BTreeMap<TextureSlot, LogicalInput>,
}

impl LogicalInputs {
    /// Input for a slot
    pub fn get(&self, slot: TextureSlot) -> Option<&LogicalInput> {
        self.inputs.get(&slot)
    }

    /// Set the input for a slot
    pub fn insert(&mut self, slot: TextureSlot, input: LogicalInput) {
        self.inputs.insert(slot, input);
    }

    /// All inputs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (TextureSlot, &LogicalInput)> {
        self.inputs.iter().map(|(slot, input)| (*slot, input))
    }

    /// Texture-backed inputs in slot order
    pub fn textures(&self) -> impl Iterator<Item = &TextureRef> {
        self.inputs.values().filter_map(|input| match input {
            LogicalInput::TextureRef(texture) => Some(texture),
            LogicalInput::Constant(_) => None,
        })
    }

    /// Constant inputs in slot order
    pub fn constants(&self) -> impl Iterator<Item = (TextureSlot, ConstantValue)> + '_ {
        self.inputs.iter().filter_map(|(slot, input)| match input {
            LogicalInput::Constant(value) => Some((*slot, *value)),
            LogicalInput::TextureRef(_) => None,
        })
    }

    /// Number of inputs
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// True when the material has neither textures nor constants
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Build the logical inputs one backend sees for a material
///
/// Present slots become texture references carrying the backend's format
/// override. The preview backend samples base color from the material's
/// preview copy. Absent slots with an entry in [`CONSTANT_DEFAULTS`] become
/// constants; the rest are left out.
///
/// # Arguments
/// * `descriptor` - Parsed material
/// * `backend` - Backend the inputs are built for
/// * `format_override` - Extension that backend reads textures in, if any
pub fn build_logical_inputs(
    descriptor: &MaterialDescriptor,
    backend: Backend,
    format_override: Option<&str>,
) -> LogicalInputs {
    let mut inputs = LogicalInputs::default();

    for (slot, source) in descriptor.bundle.iter() {
        let asset = if backend == Backend::Preview && slot == TextureSlot::BaseColor {
            AssetRef::preview(source, descriptor.name.as_str())
        } else {
            AssetRef::original(source, format_override)
        };
        inputs.insert(slot, LogicalInput::TextureRef(TextureRef { slot, asset }));
    }

    for (slot, value) in CONSTANT_DEFAULTS {
        if !descriptor.bundle.contains(slot) {
            inputs.insert(slot, LogicalInput::Constant(value));
        }
    }

    inputs
}

/// Replace a path's extension with `format_override`, or append it
///
/// The override may be written with or without a leading dot. `None` or a
/// blank override leaves the path untouched.
pub fn apply_texture_format_override(path: &Path, format_override: Option<&str>) -> PathBuf {
    let extension = format_override
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty());
    match extension {
        Some(ext) => path.with_extension(ext),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TextureBundle;

    fn body() -> MaterialDescriptor {
        let mut bundle = TextureBundle::new();
        bundle.insert(TextureSlot::BaseColor, "/tex/tex_Body_BaseColor.png");
        bundle.insert(TextureSlot::Roughness, "/tex/tex_Body_Roughness.png");
        MaterialDescriptor::new("Body", bundle)
    }

    #[test]
    fn test_format_override_replaces_or_appends() {
        assert_eq!(
            apply_texture_format_override(Path::new("textures/a.png"), Some("jpg")),
            PathBuf::from("textures/a.jpg")
        );
        assert_eq!(
            apply_texture_format_override(Path::new("textures/a"), Some(".tx")),
            PathBuf::from("textures/a.tx")
        );
        assert_eq!(
            apply_texture_format_override(Path::new("textures/a.png"), Some("  ")),
            PathBuf::from("textures/a.png")
        );
        assert_eq!(
            apply_texture_format_override(Path::new("textures/a.png"), None),
            PathBuf::from("textures/a.png")
        );
    }

    #[test]
    fn test_absent_slots_get_constants() {
        let inputs = build_logical_inputs(&body(), Backend::Arnold, None);

        assert_eq!(
            inputs.get(TextureSlot::Metalness),
            Some(&LogicalInput::Constant(ConstantValue::Float(0.0)))
        );
        assert_eq!(
            inputs.get(TextureSlot::Opacity),
            Some(&LogicalInput::Constant(ConstantValue::Float(1.0)))
        );
        assert!(matches!(inputs.get(TextureSlot::Roughness), Some(LogicalInput::TextureRef(_))));
        assert!(inputs.get(TextureSlot::Normal).is_none());
        assert_eq!(inputs.textures().count(), 2);
    }

    #[test]
    fn test_preview_base_color_uses_preview_copy() {
        let inputs = build_logical_inputs(&body(), Backend::Preview, Some("tx"));
        let Some(LogicalInput::TextureRef(base)) = inputs.get(TextureSlot::BaseColor) else {
            panic!("base color should be a texture");
        };
        assert_eq!(base.asset.copy, TextureCopy::Preview { material: "Body".into() });
        assert_eq!(base.asset.format_override, None);

        let Some(LogicalInput::TextureRef(rough)) = inputs.get(TextureSlot::Roughness) else {
            panic!("roughness should be a texture");
        };
        assert_eq!(rough.asset.copy, TextureCopy::Original);
        assert_eq!(rough.asset.format_override.as_deref(), Some("tx"));
    }

    #[test]
    fn test_constant_default_table() {
        assert_eq!(constant_default(TextureSlot::Roughness), Some(ConstantValue::Float(0.5)));
        assert_eq!(constant_default(TextureSlot::Normal), None);
    }
}
