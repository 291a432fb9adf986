//! Texture relocation
//!
//! The relocation map is the single place that decides where a texture file
//! ends up. Builders only register which sources they read; destinations are
//! assigned in one pass once every graph exists, so the outcome never depends
//! on the order materials were built in.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::PublishPaths;
use crate::config::{CollisionPolicy, PreviewTextureFormat};
use crate::error::{ExportError, ExportResult};
use crate::material::{apply_texture_format_override, sanitize_identifier, AssetRef, TextureCopy};

const UDIM_TOKEN: &str = "<UDIM>";

/// Resampling applied to a preview copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSettings {
    /// Largest width and height
    pub max_resolution: (u32, u32),
    /// Output format
    pub format: PreviewTextureFormat,
}

/// One file the serialization backend has to place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureCopyRequest {
    /// Exported file
    pub source: PathBuf,
    /// Location inside the publish
    pub destination: PathBuf,
    /// Resampling for preview copies, `None` for a plain copy
    pub preview: Option<PreviewSettings>,
}

/// Resolved destinations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationTable {
    /// Source path to relocated original, sorted by source
    pub originals: IndexMap<PathBuf, PathBuf>,
    /// Material name to its preview copy
    pub previews: IndexMap<String, TextureCopyRequest>,
}

impl RelocationTable {
    /// Destination of a source's relocated original
    pub fn destination(&self, source: &Path) -> Option<&Path> {
        self.originals.get(source).map(PathBuf::as_path)
    }

    /// Preview copy owned by a material
    pub fn preview(&self, material: &str) -> Option<&TextureCopyRequest> {
        self.previews.get(material)
    }

    /// Every copy the backend has to perform, originals first
    pub fn requests(&self) -> Vec<TextureCopyRequest> {
        self.originals
            .iter()
            .map(|(source, destination)| TextureCopyRequest {
                source: source.clone(),
                destination: destination.clone(),
                preview: None,
            })
            .chain(self.previews.values().cloned())
            .collect()
    }

    /// Number of destination files
    pub fn len(&self) -> usize {
        self.originals.len() + self.previews.len()
    }

    /// True when nothing is relocated
    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.previews.is_empty()
    }

    /// Layer-relative path a sampling node should read
    ///
    /// Originals get the asset's format override applied to the relocated
    /// name. Preview copies are read as they are.
    pub fn layer_path(&self, paths: &PublishPaths, asset: &AssetRef) -> ExportResult<String> {
        let unresolved = || ExportError::UnresolvedTexture {
            texture: asset.source.clone(),
        };
        match &asset.copy {
            TextureCopy::Original => {
                let destination = self.destination(&asset.source).ok_or_else(unresolved)?;
                let destination = apply_texture_format_override(destination, asset.format_override.as_deref());
                Ok(paths.layer_relative(&destination))
            }
            TextureCopy::Preview { material } => {
                let copy = self.preview(material).ok_or_else(unresolved)?;
                Ok(paths.layer_relative(&copy.destination))
            }
        }
    }
}

/// Append-only registry of the textures builders reference
///
/// Inserts are keyed by source path and safe to call from several threads.
#[derive(Debug, Default)]
pub struct TextureRelocationMap {
    originals: RwLock<BTreeSet<PathBuf>>,
    previews: RwLock<BTreeMap<String, PathBuf>>,
}

impl TextureRelocationMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source for relocation; false if it was already known
    pub fn insert_if_absent(&self, source: &Path) -> bool {
        if self.originals.read().unwrap_or_else(PoisonError::into_inner).contains(source) {
            return false;
        }
        self.originals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_path_buf())
    }

    /// Register the preview copy of `material`; false if it already has one
    ///
    /// A material owns a single preview copy. The first source registered
    /// for it is kept.
    pub fn insert_preview_if_absent(&self, material: &str, source: &Path) -> bool {
        let mut previews = self.previews.write().unwrap_or_else(PoisonError::into_inner);
        if previews.contains_key(material) {
            return false;
        }
        previews.insert(material.to_string(), source.to_path_buf());
        true
    }

    /// Register whatever copy an asset reference reads
    pub fn register(&self, asset: &AssetRef) -> bool {
        match &asset.copy {
            TextureCopy::Original => self.insert_if_absent(&asset.source),
            TextureCopy::Preview { material } => self.insert_preview_if_absent(material, &asset.source),
        }
    }

    /// Number of registered originals
    pub fn len(&self) -> usize {
        self.originals.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no original is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign every registered texture a destination
    ///
    /// Originals are processed in sorted source order. When two sources share
    /// a file name (compared case-insensitively) the later one gets `_1`,
    /// `_2`, ... or the export fails, depending on `policy`. Preview copies
    /// are named after the material's prim name from `prim_names`.
    ///
    /// # Arguments
    /// * `paths` - Publish layout
    /// * `policy` - Collision policy for originals
    /// * `preview` - Resampling applied to preview copies
    /// * `prim_names` - Material name to unique prim name
    pub fn resolve(
        &self,
        paths: &PublishPaths,
        policy: CollisionPolicy,
        preview: PreviewSettings,
        prim_names: &IndexMap<String, String>,
    ) -> ExportResult<RelocationTable> {
        let textures_dir = paths.textures_dir();
        let mut table = RelocationTable::default();
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();

        let originals = self.originals.read().unwrap_or_else(PoisonError::into_inner);
        for source in originals.iter() {
            let name = file_name(source);
            let mut candidate = name.clone();
            let mut suffix = 0;
            while let Some(first) = claimed.get(&candidate.to_lowercase()) {
                if policy == CollisionPolicy::Fail {
                    return Err(ExportError::PathCollision {
                        destination: textures_dir.join(&candidate),
                        first: first.clone(),
                        second: source.clone(),
                    });
                }
                suffix += 1;
                candidate = suffixed_file_name(&name, suffix);
            }
            if suffix > 0 {
                log::warn!("Texture {} relocated as '{candidate}' to avoid a name collision", source.display());
            }
            claimed.insert(candidate.to_lowercase(), source.clone());
            table.originals.insert(source.clone(), textures_dir.join(&candidate));
        }

        let preview_dir = paths.preview_textures_dir();
        let previews = self.previews.read().unwrap_or_else(PoisonError::into_inner);
        for (material, source) in previews.iter() {
            let prim = prim_names
                .get(material)
                .cloned()
                .unwrap_or_else(|| sanitize_identifier(material));
            let udim = if source.to_string_lossy().contains(UDIM_TOKEN) {
                format!(".{UDIM_TOKEN}")
            } else {
                String::new()
            };
            let destination = preview_dir.join(format!("{prim}_BaseColor{udim}.{}", preview.format.extension()));
            table.previews.insert(
                material.clone(),
                TextureCopyRequest {
                    source: source.clone(),
                    destination,
                    preview: Some(preview),
                },
            );
        }

        Ok(table)
    }
}

fn file_name(source: &Path) -> String {
    source
        .file_name()
        .map_or_else(|| "texture".to_string(), |name| name.to_string_lossy().into_owned())
}

/// `name` with `_<n>` inserted before its extension, keeping a UDIM tile token
/// attached to the extension
fn suffixed_file_name(name: &str, n: usize) -> String {
    let split = name
        .find(&format!(".{UDIM_TOKEN}"))
        .or_else(|| name.rfind('.').filter(|index| *index > 0));
    match split {
        Some(index) => format!("{}_{n}{}", &name[..index], &name[index..]),
        None => format!("{name}_{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PreviewSettings {
        PreviewSettings {
            max_resolution: (1024, 1024),
            format: PreviewTextureFormat::Jpg,
        }
    }

    fn paths() -> PublishPaths {
        PublishPaths::new("/publish", "Hero")
    }

    #[test]
    fn test_insert_if_absent() {
        let map = TextureRelocationMap::new();
        assert!(map.insert_if_absent(Path::new("/a/x.png")));
        assert!(!map.insert_if_absent(Path::new("/a/x.png")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_collisions_are_disambiguated_in_source_order() {
        let map = TextureRelocationMap::new();
        map.insert_if_absent(Path::new("/b/Body_BaseColor.png"));
        map.insert_if_absent(Path::new("/a/body_basecolor.png"));

        let table = map
            .resolve(&paths(), CollisionPolicy::Disambiguate, settings(), &IndexMap::new())
            .unwrap();

        assert_eq!(
            table.destination(Path::new("/a/body_basecolor.png")),
            Some(Path::new("/publish/Hero/textures/body_basecolor.png"))
        );
        assert_eq!(
            table.destination(Path::new("/b/Body_BaseColor.png")),
            Some(Path::new("/publish/Hero/textures/Body_BaseColor_1.png"))
        );
        let destinations: BTreeSet<_> = table.originals.values().collect();
        assert_eq!(destinations.len(), table.originals.len());
    }

    #[test]
    fn test_fail_policy_reports_collision() {
        let map = TextureRelocationMap::new();
        map.insert_if_absent(Path::new("/a/x.png"));
        map.insert_if_absent(Path::new("/b/x.png"));

        let result = map.resolve(&paths(), CollisionPolicy::Fail, settings(), &IndexMap::new());
        match result {
            Err(ExportError::PathCollision { first, second, .. }) => {
                assert_eq!(first, PathBuf::from("/a/x.png"));
                assert_eq!(second, PathBuf::from("/b/x.png"));
            }
            other => panic!("expected a path collision, got {other:?}"),
        }
    }

    #[test]
    fn test_preview_copy_is_second_destination() {
        let map = TextureRelocationMap::new();
        let source = Path::new("/tex/Body_BaseColor.png");
        map.insert_if_absent(source);
        map.insert_preview_if_absent("Body", source);

        let table = map
            .resolve(&paths(), CollisionPolicy::Fail, settings(), &IndexMap::new())
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.preview("Body").unwrap().destination,
            PathBuf::from("/publish/Hero/textures/previewTextures/Body_BaseColor.jpg")
        );
    }

    #[test]
    fn test_udim_token_survives() {
        assert_eq!(suffixed_file_name("Body_BaseColor.<UDIM>.png", 1), "Body_BaseColor_1.<UDIM>.png");
        assert_eq!(suffixed_file_name("noext", 2), "noext_2");

        let map = TextureRelocationMap::new();
        map.insert_preview_if_absent("Body", Path::new("/tex/Body_BaseColor.<UDIM>.png"));
        let table = map
            .resolve(&paths(), CollisionPolicy::Fail, settings(), &IndexMap::new())
            .unwrap();
        assert!(table
            .preview("Body")
            .unwrap()
            .destination
            .ends_with("Body_BaseColor.<UDIM>.jpg"));
    }

    #[test]
    fn test_layer_path_applies_format_override() {
        let map = TextureRelocationMap::new();
        let asset = AssetRef::original("/tex/Body_Roughness.png", Some("exr"));
        map.register(&asset);
        let table = map
            .resolve(&paths(), CollisionPolicy::Fail, settings(), &IndexMap::new())
            .unwrap();

        assert_eq!(table.layer_path(&paths(), &asset).unwrap(), "./textures/Body_Roughness.exr");
        let missing = AssetRef::original("/tex/other.png", None);
        assert!(matches!(
            table.layer_path(&paths(), &missing),
            Err(ExportError::UnresolvedTexture { .. })
        ));
    }

    #[test]
    fn test_concurrent_registration() {
        let map = std::sync::Arc::new(TextureRelocationMap::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let map = std::sync::Arc::clone(&map);
                std::thread::spawn(move || {
                    for i in 0..16 {
                        map.insert_if_absent(&PathBuf::from(format!("/tex/t{i}.png")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 16);
    }
}
