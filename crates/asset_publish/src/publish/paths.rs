//! Publish directory layout and prim namespace
//!
//! ```text
//! <publish_root>/<AssetName>/
//!   <AssetName>.usd
//!   payload.usdc
//!   mtl.usdc
//!   geo.usdc
//!   textures/
//!   textures/previewTextures/
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;

/// Payload layer file name
pub const PAYLOAD_FILE: &str = "payload.usdc";
/// Material layer file name
pub const MATERIAL_FILE: &str = "mtl.usdc";
/// Geometry layer file name
pub const GEOMETRY_FILE: &str = "geo.usdc";
/// Relocated textures directory, relative to the asset directory
pub const TEXTURES_DIR: &str = "textures";
/// Preview copies directory, relative to the textures directory
pub const PREVIEW_TEXTURES_DIR: &str = "previewTextures";

/// Resolved file and prim locations for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPaths {
    /// Prim-safe asset name
    pub asset_name: String,
    /// `<publish_root>/<AssetName>`
    pub asset_dir: PathBuf,
}

impl PublishPaths {
    /// Layout for `asset_name` under `publish_root`
    pub fn new(publish_root: impl AsRef<Path>, asset_name: impl Into<String>) -> Self {
        let asset_name = asset_name.into();
        Self {
            asset_dir: publish_root.as_ref().join(&asset_name),
            asset_name,
        }
    }

    /// Layout described by an export configuration
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.resolved_publish_root(), config.asset_identifier())
    }

    /// Entry layer file
    pub fn entry_file(&self) -> PathBuf {
        self.asset_dir.join(format!("{}.usd", self.asset_name))
    }

    /// Entry layer identifier recorded in `assetInfo`
    pub fn entry_identifier(&self) -> String {
        format!("./{}.usd", self.asset_name)
    }

    /// Payload layer file
    pub fn payload_file(&self) -> PathBuf {
        self.asset_dir.join(PAYLOAD_FILE)
    }

    /// Material layer file
    pub fn material_file(&self) -> PathBuf {
        self.asset_dir.join(MATERIAL_FILE)
    }

    /// Geometry layer file
    pub fn geometry_file(&self) -> PathBuf {
        self.asset_dir.join(GEOMETRY_FILE)
    }

    /// Directory of relocated originals
    pub fn textures_dir(&self) -> PathBuf {
        self.asset_dir.join(TEXTURES_DIR)
    }

    /// Directory of preview copies
    pub fn preview_textures_dir(&self) -> PathBuf {
        self.textures_dir().join(PREVIEW_TEXTURES_DIR)
    }

    /// Path as written inside a layer: `./` plus `/`-separated components
    /// relative to the asset directory
    ///
    /// Paths outside the asset directory are returned as they are.
    pub fn layer_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.asset_dir) {
            Ok(relative) => {
                let parts: Vec<_> = relative
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(part) => Some(part.to_string_lossy()),
                        _ => None,
                    })
                    .collect();
                format!("./{}", parts.join("/"))
            }
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    /// `/<Asset>`
    pub fn root_prim(&self) -> String {
        format!("/{}", self.asset_name)
    }

    /// `/__class__/<Asset>`
    pub fn class_prim(&self) -> String {
        format!("/__class__/{}", self.asset_name)
    }

    /// `/<Asset>/mtl`
    pub fn materials_scope(&self) -> String {
        format!("/{}/mtl", self.asset_name)
    }

    /// `/<Asset>/mtl/<Material>`
    pub fn material_prim(&self, material: &str) -> String {
        format!("{}/{material}", self.materials_scope())
    }

    /// `/<Asset>/geo`
    pub fn geometry_scope(&self) -> String {
        format!("/{}/geo", self.asset_name)
    }

    /// `/<Asset>/geo/render`
    pub fn render_scope(&self) -> String {
        format!("{}/render", self.geometry_scope())
    }

    /// `/<Asset>/geo/proxy`
    pub fn proxy_scope(&self) -> String {
        format!("{}/proxy", self.geometry_scope())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = PublishPaths::new("/publish", "Hero");

        assert_eq!(paths.entry_file(), PathBuf::from("/publish/Hero/Hero.usd"));
        assert_eq!(paths.payload_file(), PathBuf::from("/publish/Hero/payload.usdc"));
        assert_eq!(paths.material_file(), PathBuf::from("/publish/Hero/mtl.usdc"));
        assert_eq!(paths.geometry_file(), PathBuf::from("/publish/Hero/geo.usdc"));
        assert_eq!(
            paths.preview_textures_dir(),
            PathBuf::from("/publish/Hero/textures/previewTextures")
        );
    }

    #[test]
    fn test_layer_relative() {
        let paths = PublishPaths::new("/publish", "Hero");
        let texture = paths.textures_dir().join("Body_BaseColor.png");

        assert_eq!(paths.layer_relative(&texture), "./textures/Body_BaseColor.png");
        assert_eq!(paths.layer_relative(Path::new("/elsewhere/geo.abc")), "/elsewhere/geo.abc");
    }

    #[test]
    fn test_prim_namespace() {
        let paths = PublishPaths::new("/publish", "Hero");
        assert_eq!(paths.material_prim("Body"), "/Hero/mtl/Body");
        assert_eq!(paths.render_scope(), "/Hero/geo/render");
        assert_eq!(paths.class_prim(), "/__class__/Hero");
    }

    #[test]
    fn test_usd_publish_root_uses_parent() {
        let config = ExportConfig::new("Hero", "/publish/scene.usda");
        assert_eq!(PublishPaths::from_config(&config).asset_dir, PathBuf::from("/publish/Hero"));
    }
}
