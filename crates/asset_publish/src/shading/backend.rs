//! Shading backends and their static naming tables

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assets::TextureSlot;
use crate::config::BackendFlags;

/// Supported shading representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// Physically-based preview surface
    Preview,
    /// MaterialX standard surface
    StandardSurface,
    /// MaterialX OpenPBR surface
    OpenPbr,
    /// Arnold standard surface
    Arnold,
}

impl Backend {
    /// Every backend in authoring order
    pub const ALL: [Self; 4] = [Self::Preview, Self::StandardSurface, Self::OpenPbr, Self::Arnold];

    /// Key used in configuration files
    pub const fn key(self) -> &'static str {
        match self {
            Self::Preview => "usd_preview",
            Self::StandardSurface => "mtlx",
            Self::OpenPbr => "openpbr",
            Self::Arnold => "arnold",
        }
    }

    /// Backend for a configuration key
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|backend| backend.key() == key)
    }

    /// Flag in [`BackendFlags`]
    pub const fn flag(self) -> BackendFlags {
        match self {
            Self::Preview => BackendFlags::PREVIEW,
            Self::StandardSurface => BackendFlags::STANDARD_SURFACE,
            Self::OpenPbr => BackendFlags::OPEN_PBR,
            Self::Arnold => BackendFlags::ARNOLD,
        }
    }

    /// Prim name of the node graph this backend authors under a material
    pub const fn node_graph_name(self) -> &'static str {
        match self {
            Self::Preview => "UsdPreviewNodeGraph",
            Self::StandardSurface => "MtlxNodeGraph",
            Self::OpenPbr => "OpenPbrNodeGraph",
            Self::Arnold => "ArnoldNodeGraph",
        }
    }

    /// Prefix of the node ids this backend authors
    pub const fn node_prefix(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::StandardSurface => "mtlx",
            Self::OpenPbr => "openpbr",
            Self::Arnold => "arnold",
        }
    }

    /// Namespace of the material terminals, empty for the universal one
    pub const fn terminal_namespace(self) -> &'static str {
        match self {
            Self::Preview => "",
            Self::StandardSurface => "mtlx",
            Self::OpenPbr => "openpbr",
            Self::Arnold => "arnold",
        }
    }

    /// Material output name for a graph-level output of this backend
    pub fn terminal(self, output: &str) -> String {
        match self.terminal_namespace() {
            "" => output.to_string(),
            namespace => format!("{namespace}:{output}"),
        }
    }

    /// Surface input a slot drives on this backend's surface shader
    ///
    /// `None` means the backend has no place for the slot and it is skipped.
    pub const fn input_name(self, slot: TextureSlot) -> Option<&'static str> {
        use TextureSlot::{BaseColor, Displacement, Metalness, Normal, Occlusion, Opacity, Roughness};

        match (self, slot) {
            (Self::Preview, BaseColor) => Some("diffuseColor"),
            (Self::Preview, Metalness) => Some("metallic"),
            (Self::Preview, Roughness) => Some("roughness"),
            (Self::Preview, Normal) => Some("normal"),
            (Self::Preview, Opacity) => Some("opacity"),
            (Self::Preview, Occlusion) => Some("occlusion"),
            (Self::Preview, Displacement) => Some("displacement"),

            (Self::StandardSurface, BaseColor) => Some("base_color"),
            (Self::StandardSurface, Metalness) => Some("metalness"),
            (Self::StandardSurface, Roughness) => Some("specular_roughness"),
            (Self::StandardSurface, Normal) => Some("normal"),
            (Self::StandardSurface, Opacity) => Some("opacity"),
            (Self::StandardSurface, Displacement) => Some("displacement"),

            (Self::OpenPbr, BaseColor) => Some("base_color"),
            (Self::OpenPbr, Metalness) => Some("base_metalness"),
            (Self::OpenPbr, Roughness) => Some("specular_roughness"),
            (Self::OpenPbr, Normal) => Some("geometry_normal"),
            (Self::OpenPbr, Opacity) => Some("geometry_opacity"),
            (Self::OpenPbr, Displacement) => Some("displacement"),

            (Self::Arnold, BaseColor) => Some("base_color"),
            (Self::Arnold, Metalness) => Some("metalness"),
            (Self::Arnold, Roughness) => Some("specular_roughness"),
            (Self::Arnold, Normal) => Some("normal"),
            (Self::Arnold, Opacity) => Some("opacity"),
            (Self::Arnold, Displacement) => Some("height"),

            (Self::StandardSurface | Self::OpenPbr | Self::Arnold, Occlusion) => None,
        }
    }

    /// Human-readable name for logs
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Preview => "USD Preview Surface",
            Self::StandardSurface => "MaterialX Standard Surface",
            Self::OpenPbr => "MaterialX OpenPBR",
            Self::Arnold => "Arnold Standard Surface",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roughness_names_differ_per_backend() {
        assert_eq!(Backend::Preview.input_name(TextureSlot::Roughness), Some("roughness"));
        assert_eq!(Backend::Arnold.input_name(TextureSlot::Roughness), Some("specular_roughness"));
        assert_eq!(Backend::OpenPbr.input_name(TextureSlot::Metalness), Some("base_metalness"));
    }

    #[test]
    fn test_occlusion_only_on_preview() {
        for backend in Backend::ALL {
            let expected = backend == Backend::Preview;
            assert_eq!(backend.input_name(TextureSlot::Occlusion).is_some(), expected);
        }
    }

    #[test]
    fn test_terminals_are_distinct() {
        let terminals: std::collections::HashSet<_> =
            Backend::ALL.iter().map(|backend| backend.terminal("surface")).collect();
        assert_eq!(terminals.len(), 4);
        assert_eq!(Backend::Preview.terminal("surface"), "surface");
        assert_eq!(Backend::Arnold.terminal("displacement"), "arnold:displacement");
    }

    #[test]
    fn test_key_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(Backend::from_key(backend.key()), Some(backend));
        }
        assert_eq!(Backend::from_key("MTLX"), Some(Backend::StandardSurface));
        assert_eq!(Backend::from_key("cycles"), None);
    }
}
