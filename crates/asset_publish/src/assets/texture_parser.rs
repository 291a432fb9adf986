//! Texture bundle parser
//!
//! Groups the host's raw `(material, texture set, file)` triples into one
//! [`MaterialDescriptor`] per material. Nothing in here fails: entries that
//! cannot be used are recorded as [`SkipRecord`]s and logged.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::material_descriptor::normalize_mesh_names;
use super::{MaterialDescriptor, TextureBundle, TextureSlot};

/// One exported texture as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTexture {
    /// Material the texture belongs to
    pub material_key: String,
    /// Texture set it was exported from
    #[serde(default)]
    pub texture_set_key: String,
    /// Absolute path of the exported file
    pub file_path: PathBuf,
}

impl RawTexture {
    /// Create a raw texture entry
    pub fn new(
        material_key: impl Into<String>,
        texture_set_key: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            material_key: material_key.into(),
            texture_set_key: texture_set_key.into(),
            file_path: file_path.into(),
        }
    }
}

impl<M, T, P> From<(M, T, P)> for RawTexture
where
    M: Into<String>,
    T: Into<String>,
    P: Into<PathBuf>,
{
    fn from((material_key, texture_set_key, file_path): (M, T, P)) -> Self {
        Self::new(material_key, texture_set_key, file_path)
    }
}

/// Why an input entry or a material did not make it into the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipRecord {
    /// File name matched no slot token
    ClassificationSkip {
        /// Owning material
        material: String,
        /// Dropped file
        path: PathBuf,
    },
    /// Material ended up with no resolved slot
    EmptyMaterialSkip {
        /// Dropped material
        material: String,
    },
    /// Entry could not be read at all
    MalformedEntry {
        /// Owning material, possibly empty
        material: String,
        /// Offending path
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
}

/// Parser output: the descriptors plus everything that was dropped
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Publishable materials in first-seen order
    pub materials: IndexMap<String, MaterialDescriptor>,
    /// Dropped entries and materials
    pub skipped: Vec<SkipRecord>,
}

/// Texture bundle parser
pub struct TextureBundleParser;

impl TextureBundleParser {
    /// Group raw textures into material descriptors
    ///
    /// # Arguments
    /// * `raw` - Exported textures in host order
    ///
    /// # Returns
    /// Publishable materials keyed by name, in first-seen order
    pub fn parse(raw: &[RawTexture]) -> IndexMap<String, MaterialDescriptor> {
        Self::parse_with_report(raw, &IndexMap::new()).materials
    }

    /// Group raw textures and attach per-texture-set mesh names
    ///
    /// A material spread over several texture sets keeps the first set it
    /// was seen in, and takes that set's mesh names. When two files resolve
    /// to the same slot the later one wins.
    ///
    /// # Arguments
    /// * `raw` - Exported textures in host order
    /// * `mesh_names` - Texture set key to bound mesh names
    ///
    /// # Returns
    /// The descriptors together with every skip that happened
    pub fn parse_with_report(
        raw: &[RawTexture],
        mesh_names: &IndexMap<String, Vec<String>>,
    ) -> ParseReport {
        let mut report = ParseReport::default();
        let mut groups: IndexMap<String, MaterialDescriptor> = IndexMap::new();

        for entry in raw {
            let material = entry.material_key.trim();
            let file_name = match Self::file_name(&entry.file_path) {
                Ok(name) if !material.is_empty() => name,
                Ok(_) => {
                    report.skipped.push(Self::malformed(entry, "empty material key"));
                    continue;
                }
                Err(reason) => {
                    report.skipped.push(Self::malformed(entry, reason));
                    continue;
                }
            };

            let descriptor = groups.entry(material.to_string()).or_insert_with(|| {
                let mut descriptor = MaterialDescriptor::new(material, TextureBundle::new());
                descriptor.texture_set = entry.texture_set_key.clone();
                descriptor
            });

            let Some(slot) = TextureSlot::classify(file_name) else {
                log::debug!("Skipping unclassified texture {}", entry.file_path.display());
                report.skipped.push(SkipRecord::ClassificationSkip {
                    material: material.to_string(),
                    path: entry.file_path.clone(),
                });
                continue;
            };

            if let Some(previous) = descriptor.bundle.insert(slot, entry.file_path.clone()) {
                log::warn!(
                    "Material '{}' has two {} textures, keeping {} over {}",
                    material,
                    slot,
                    entry.file_path.display(),
                    previous.display()
                );
            }
        }

        for (name, mut descriptor) in groups {
            if descriptor.bundle.is_empty() {
                log::info!("Dropping material '{name}': no classifiable textures");
                report.skipped.push(SkipRecord::EmptyMaterialSkip { material: name });
                continue;
            }
            if let Some(names) = mesh_names.get(&descriptor.texture_set) {
                descriptor.mesh_names = normalize_mesh_names(names);
            }
            report.materials.insert(name, descriptor);
        }

        report
    }

    fn file_name(path: &Path) -> Result<&str, &'static str> {
        if path.as_os_str().is_empty() {
            return Err("empty path");
        }
        path.file_name()
            .ok_or("path has no file name")?
            .to_str()
            .ok_or("file name is not valid UTF-8")
    }

    fn malformed(entry: &RawTexture, reason: &str) -> SkipRecord {
        log::debug!("Skipping malformed texture entry {}: {reason}", entry.file_path.display());
        SkipRecord::MalformedEntry {
            material: entry.material_key.clone(),
            path: entry.file_path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, &str, &str)]) -> Vec<RawTexture> {
        entries.iter().map(|&entry| RawTexture::from(entry)).collect()
    }

    #[test]
    fn test_parse_groups_by_material() {
        let input = raw(&[
            ("Body", "", "/tex/tex_Body_BaseColor.png"),
            ("Head", "", "/tex/tex_Head_Normal.png"),
            ("Body", "", "/tex/tex_Body_Roughness.png"),
        ]);
        let materials = TextureBundleParser::parse(&input);

        assert_eq!(materials.keys().collect::<Vec<_>>(), vec!["Body", "Head"]);
        let body = &materials["Body"];
        assert_eq!(body.bundle.len(), 2);
        assert_eq!(
            body.bundle.get(TextureSlot::Roughness),
            Some(Path::new("/tex/tex_Body_Roughness.png"))
        );
    }

    #[test]
    fn test_unclassified_file_is_dropped() {
        let input = raw(&[
            ("Street", "", "/tex/asset_road_02.png"),
            ("Street", "", "/tex/street_basecolor.png"),
        ]);
        let report = TextureBundleParser::parse_with_report(&input, &IndexMap::new());

        assert_eq!(report.materials["Street"].bundle.len(), 1);
        assert!(report.skipped.contains(&SkipRecord::ClassificationSkip {
            material: "Street".into(),
            path: PathBuf::from("/tex/asset_road_02.png"),
        }));
    }

    #[test]
    fn test_all_unclassified_gives_empty_result() {
        let input = raw(&[
            ("A", "", "/tex/a_emissive.png"),
            ("B", "", "/tex/b_road.png"),
            ("B", "", "/tex/b_mask.png"),
        ]);
        let report = TextureBundleParser::parse_with_report(&input, &IndexMap::new());

        assert!(report.materials.is_empty());
        assert!(report.skipped.contains(&SkipRecord::EmptyMaterialSkip { material: "A".into() }));
        assert!(report.skipped.contains(&SkipRecord::EmptyMaterialSkip { material: "B".into() }));
    }

    #[test]
    fn test_slot_collision_last_wins() {
        let input = raw(&[
            ("Body", "", "/tex/v1/body_roughness.png"),
            ("Body", "", "/tex/v2/body_roughness.png"),
        ]);
        let materials = TextureBundleParser::parse(&input);
        assert_eq!(
            materials["Body"].bundle.get(TextureSlot::Roughness),
            Some(Path::new("/tex/v2/body_roughness.png"))
        );
    }

    #[test]
    fn test_first_texture_set_provides_mesh_names() {
        let input = raw(&[
            ("Skin", "SetA", "/tex/skin_basecolor.png"),
            ("Skin", "SetB", "/tex/skin_normal.png"),
        ]);
        let mut meshes = IndexMap::new();
        meshes.insert("SetA".to_string(), vec!["Head".to_string(), "Body".to_string(), "Head".to_string()]);
        meshes.insert("SetB".to_string(), vec!["Legs".to_string()]);

        let report = TextureBundleParser::parse_with_report(&input, &meshes);
        let skin = &report.materials["Skin"];

        assert_eq!(skin.texture_set, "SetA");
        assert_eq!(skin.bundle.len(), 2);
        assert_eq!(skin.mesh_names.iter().collect::<Vec<_>>(), vec!["Head", "Body"]);
    }

    #[test]
    fn test_malformed_entries_do_not_abort() {
        let input = raw(&[
            ("Body", "", ""),
            ("", "", "/tex/orphan_normal.png"),
            ("Body", "", "/tex/body_normal.png"),
        ]);
        let report = TextureBundleParser::parse_with_report(&input, &IndexMap::new());

        assert_eq!(report.materials.len(), 1);
        let malformed = report
            .skipped
            .iter()
            .filter(|skip| matches!(skip, SkipRecord::MalformedEntry { .. }))
            .count();
        assert_eq!(malformed, 2);
    }

    #[test]
    fn test_directory_names_do_not_classify() {
        let input = raw(&[("Body", "", "/exports/ao/body_mask.png")]);
        assert!(TextureBundleParser::parse(&input).is_empty());
    }
}
