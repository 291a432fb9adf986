//! # Export Configuration
//!
//! Everything a single export invocation needs to know, passed in by value.
//!
//! ## Sections
//!
//! - **Backends**: which shading representations are authored
//! - **Layout**: publish root, asset name, optional geometry
//! - **Textures**: per-backend format overrides and preview copies
//! - **Policies**: relocation collisions and displacement handling

use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::host::HostVersion;
use crate::material::naming::{sanitize_identifier, NamingConvention};
use crate::shading::Backend;

bitflags! {
    /// Set of enabled shading backends
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BackendFlags: u8 {
        /// Physically-based preview surface
        const PREVIEW = 1 << 0;
        /// MaterialX standard surface
        const STANDARD_SURFACE = 1 << 1;
        /// MaterialX OpenPBR surface
        const OPEN_PBR = 1 << 2;
        /// Arnold standard surface
        const ARNOLD = 1 << 3;
    }
}

impl BackendFlags {
    /// Enabled backends in authoring order
    pub fn backends(self) -> impl Iterator<Item = Backend> {
        Backend::ALL.into_iter().filter(move |backend| self.contains(backend.flag()))
    }
}

/// File format of the preview-backend texture copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PreviewTextureFormat {
    /// JPEG with the short extension
    #[default]
    Jpg,
    /// JPEG with the long extension
    Jpeg,
    /// PNG
    Png,
}

impl PreviewTextureFormat {
    /// Parse an extension such as `jpg`, `.PNG` or `jpeg`
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        let normalized = trimmed.strip_prefix('.').unwrap_or(trimmed).to_ascii_lowercase();
        match normalized.as_str() {
            "jpg" => Ok(Self::Jpg),
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            _ => Err(ConfigError::Invalid(format!(
                "preview texture format must be jpg, jpeg or png, got '{value}'"
            ))),
        }
    }

    /// File extension without the dot
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

impl TryFrom<String> for PreviewTextureFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).map_err(|e| e.to_string())
    }
}

impl From<PreviewTextureFormat> for String {
    fn from(format: PreviewTextureFormat) -> Self {
        format.extension().to_string()
    }
}

impl fmt::Display for PreviewTextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the Arnold backend consumes a displacement map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplacementMode {
    /// Feed the height into the shared bump node
    #[default]
    Bump,
    /// Drive a true displacement node exposed as a graph output
    Displacement,
}

/// What to do when two source textures share a destination file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Append `_1`, `_2`, ... to later sources in sorted source-path order
    #[default]
    Disambiguate,
    /// Abort the export with a path collision error
    Fail,
}

/// # Export Configuration
///
/// Recognised options for one export. Missing keys in a config file fall
/// back to [`ExportConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Asset name, used for the publish folder and the root prim
    pub asset_name: String,
    /// Author the preview surface
    pub enable_preview: bool,
    /// Author the MaterialX standard surface
    pub enable_alt_standard_surface: bool,
    /// Author the MaterialX OpenPBR surface
    pub enable_openpbr: bool,
    /// Author the Arnold standard surface
    pub enable_alt_backend: bool,
    /// Publish directory, or a `.usd` file inside it
    pub publish_root: PathBuf,
    /// Geometry file referenced by the geometry layer
    pub geometry_source: Option<PathBuf>,
    /// Write `geo.usdc`
    pub save_geometry: bool,
    /// Backend key to texture extension
    pub format_overrides: IndexMap<String, String>,
    /// Largest preview copy size (width, height)
    pub preview_texture_max_resolution: (u32, u32),
    /// Preview copy file format
    pub preview_texture_format: PreviewTextureFormat,
    /// Arnold displacement handling
    pub arnold_displacement_mode: DisplacementMode,
    /// Relocation collision policy
    pub relocation_collision: CollisionPolicy,
    /// Material name prefixes and suffixes ignored when binding by name
    pub naming_convention: NamingConvention,
    /// Version reported by the host, checked before any work starts
    pub host_version: Option<HostVersion>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            asset_name: "Asset".to_string(),
            enable_preview: true,
            enable_alt_standard_surface: true,
            enable_openpbr: false,
            enable_alt_backend: true,
            publish_root: PathBuf::from("publish"),
            geometry_source: None,
            save_geometry: false,
            format_overrides: IndexMap::new(),
            preview_texture_max_resolution: (1024, 1024),
            preview_texture_format: PreviewTextureFormat::default(),
            arnold_displacement_mode: DisplacementMode::default(),
            relocation_collision: CollisionPolicy::default(),
            naming_convention: NamingConvention::default(),
            host_version: None,
        }
    }
}

impl Config for ExportConfig {}

impl ExportConfig {
    /// Create a configuration publishing `asset_name` under `publish_root`
    pub fn new(asset_name: impl Into<String>, publish_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_name: asset_name.into(),
            publish_root: publish_root.into(),
            ..Default::default()
        }
    }

    /// Replace the enabled backend set
    pub fn with_backends(mut self, backends: BackendFlags) -> Self {
        self.enable_preview = backends.contains(BackendFlags::PREVIEW);
        self.enable_alt_standard_surface = backends.contains(BackendFlags::STANDARD_SURFACE);
        self.enable_openpbr = backends.contains(BackendFlags::OPEN_PBR);
        self.enable_alt_backend = backends.contains(BackendFlags::ARNOLD);
        self
    }

    /// Reference a geometry file and optionally write the geometry layer
    pub fn with_geometry(mut self, source: Option<PathBuf>, save_geometry: bool) -> Self {
        self.geometry_source = source;
        self.save_geometry = save_geometry;
        self
    }

    /// Set the texture extension used by one backend
    pub fn with_format_override(mut self, backend: Backend, extension: impl Into<String>) -> Self {
        self.format_overrides.insert(backend.key().to_string(), extension.into());
        self
    }

    /// Set the host version checked by the pre-flight
    pub fn with_host_version(mut self, version: HostVersion) -> Self {
        self.host_version = Some(version);
        self
    }

    /// Enabled backends as a flag set
    pub fn backends(&self) -> BackendFlags {
        let mut flags = BackendFlags::empty();
        flags.set(BackendFlags::PREVIEW, self.enable_preview);
        flags.set(BackendFlags::STANDARD_SURFACE, self.enable_alt_standard_surface);
        flags.set(BackendFlags::OPEN_PBR, self.enable_openpbr);
        flags.set(BackendFlags::ARNOLD, self.enable_alt_backend);
        flags
    }

    /// Asset name as a valid prim identifier
    pub fn asset_identifier(&self) -> String {
        sanitize_identifier(&self.asset_name)
    }

    /// Directory the asset folder is created in
    ///
    /// A publish root naming a USD file resolves to its parent directory.
    pub fn resolved_publish_root(&self) -> PathBuf {
        let is_usd_file = self
            .publish_root
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "usd" | "usda" | "usdc"));
        if is_usd_file {
            self.publish_root.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        } else {
            self.publish_root.clone()
        }
    }

    /// Texture extension override for a backend, if any
    pub fn format_override(&self, backend: Backend) -> Option<&str> {
        self.format_overrides
            .iter()
            .find(|(key, _)| Backend::from_key(key) == Some(backend))
            .map(|(_, ext)| ext.as_str())
            .filter(|ext| !ext.trim().is_empty())
    }

    /// Check option combinations before any export work starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends().is_empty() {
            return Err(ConfigError::Invalid("no shading backend is enabled".to_string()));
        }
        if self.asset_identifier().trim_matches('_').is_empty() {
            return Err(ConfigError::Invalid(format!(
                "asset name '{}' has no usable characters",
                self.asset_name
            )));
        }
        if self.publish_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("publish root is empty".to_string()));
        }
        let (width, height) = self.preview_texture_max_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "preview texture resolution {width}x{height} must be non-zero"
            )));
        }
        if let Some(key) = self.format_overrides.keys().find(|key| Backend::from_key(key).is_none()) {
            return Err(ConfigError::Invalid(format!("unknown backend '{key}' in format overrides")));
        }
        Ok(())
    }
}
