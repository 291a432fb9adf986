//! Per-material texture bundles and descriptors

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::TextureSlot;

/// Slot to texture path mapping for one material
///
/// Holds at most one path per slot. Iteration follows slot precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureBundle {
    slots: BTreeMap<TextureSlot, PathBuf>,
}

impl TextureBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a texture to a slot, returning the path it replaced
    pub fn insert(&mut self, slot: TextureSlot, path: impl Into<PathBuf>) -> Option<PathBuf> {
        self.slots.insert(slot, path.into())
    }

    /// Texture assigned to a slot
    pub fn get(&self, slot: TextureSlot) -> Option<&Path> {
        self.slots.get(&slot).map(PathBuf::as_path)
    }

    /// Whether a slot has a texture
    pub fn contains(&self, slot: TextureSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Resolved slots in precedence order
    pub fn iter(&self) -> impl Iterator<Item = (TextureSlot, &Path)> {
        self.slots.iter().map(|(slot, path)| (*slot, path.as_path()))
    }

    /// Number of resolved slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot resolved
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl FromIterator<(TextureSlot, PathBuf)> for TextureBundle {
    fn from_iter<I: IntoIterator<Item = (TextureSlot, PathBuf)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// One publishable material
///
/// Built once by the parser and read by every backend builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDescriptor {
    /// Material name, unique within a publish
    pub name: String,
    /// Texture set the material was first seen in
    pub texture_set: String,
    /// Resolved textures
    pub bundle: TextureBundle,
    /// Geometry components bound to this material; empty means bind by name
    pub mesh_names: IndexSet<String>,
}

impl MaterialDescriptor {
    /// Create a descriptor without mesh assignments
    pub fn new(name: impl Into<String>, bundle: TextureBundle) -> Self {
        Self {
            name: name.into(),
            texture_set: String::new(),
            bundle,
            mesh_names: IndexSet::new(),
        }
    }

    /// Attach mesh names, dropping blanks and duplicates while keeping order
    pub fn with_mesh_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mesh_names = normalize_mesh_names(names);
        self
    }

    /// Material name contains a glass token
    pub fn is_transmissive(&self) -> bool {
        crate::material::naming::is_transmissive(&self.name)
    }
}

/// Trim, drop empty entries, and de-duplicate mesh names in order
pub fn normalize_mesh_names<I, S>(names: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_keeps_one_path_per_slot() {
        let mut bundle = TextureBundle::new();
        assert!(bundle.insert(TextureSlot::Roughness, "/a/r1.png").is_none());
        let replaced = bundle.insert(TextureSlot::Roughness, "/a/r2.png");
        assert_eq!(replaced, Some(PathBuf::from("/a/r1.png")));
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.get(TextureSlot::Roughness), Some(Path::new("/a/r2.png")));
    }

    #[test]
    fn test_bundle_iterates_in_slot_order() {
        let bundle: TextureBundle = [
            (TextureSlot::Normal, PathBuf::from("n.png")),
            (TextureSlot::BaseColor, PathBuf::from("c.png")),
        ]
        .into_iter()
        .collect();
        let slots: Vec<_> = bundle.iter().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![TextureSlot::BaseColor, TextureSlot::Normal]);
    }

    #[test]
    fn test_mesh_names_are_deduplicated() {
        let descriptor = MaterialDescriptor::new("Skin", TextureBundle::new())
            .with_mesh_names(["Head", "", "Body", "Head", "  "]);
        let names: Vec<_> = descriptor.mesh_names.iter().cloned().collect();
        assert_eq!(names, vec!["Head".to_string(), "Body".to_string()]);
    }
}
