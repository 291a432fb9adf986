//! # Asset Publish
//!
//! Turns the texture files a painting application exports into a layered,
//! renderer-agnostic USD asset description.
//!
//! ## Features
//!
//! - **Texture Classification**: File names mapped to material slots by token
//! - **Material Model**: Backend-agnostic logical inputs with constant defaults
//! - **Shader Networks**: Preview surface, MaterialX standard surface, OpenPBR and Arnold
//! - **Layered Publish**: Entry, payload, material and geometry layers with bindings
//! - **Staged Writes**: Nothing is written unless the whole plan composes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asset_publish::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::load_from_file("export.toml")?;
//!     let export = TextureExport::new(vec![
//!         RawTexture::new("Body", "", "/tmp/tex_Body_BaseColor.png"),
//!         RawTexture::new("Body", "", "/tmp/tex_Body_Roughness.png"),
//!     ]);
//!
//!     let plan = on_export_complete(&export, &config)?;
//!     println!("{} material(s)", plan.material_layer.materials.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod error;
pub mod foundation;
pub mod host;
pub mod material;
pub mod publish;
pub mod shading;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use assets::{MaterialDescriptor, RawTexture, TextureBundleParser};
use config::ExportConfig;
use error::{ExportError, ExportResult};
use publish::{GeometryManifest, LayeringEngine, PublishPlan, SerializationBackend};

/// Everything the host reports once its texture export has finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureExport {
    /// Exported files in host order
    pub textures: Vec<RawTexture>,
    /// Texture set key to the meshes it is assigned to
    #[serde(default)]
    pub mesh_names: IndexMap<String, Vec<String>>,
    /// Authored geometry components, when known
    #[serde(default)]
    pub geometry: Option<GeometryManifest>,
}

impl TextureExport {
    /// Export with textures only
    pub fn new(textures: Vec<RawTexture>) -> Self {
        Self {
            textures,
            ..Self::default()
        }
    }

    /// Assign meshes to a texture set
    pub fn with_mesh_names<I, S>(mut self, texture_set: impl Into<String>, meshes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mesh_names
            .insert(texture_set.into(), meshes.into_iter().map(Into::into).collect());
        self
    }

    /// Attach the authored geometry components
    pub fn with_geometry(mut self, geometry: GeometryManifest) -> Self {
        self.geometry = Some(geometry);
        self
    }
}

/// Build the publish plan for a finished texture export
///
/// Runs the host pre-flight and config validation first, then parses,
/// builds, resolves and composes. Nothing is written.
///
/// # Errors
/// Any fatal [`ExportError`]; skipped files and materials are only logged.
pub fn on_export_complete(export: &TextureExport, config: &ExportConfig) -> ExportResult<PublishPlan> {
    let materials = prepare(export, config)?;
    LayeringEngine::new(config, materials, export.geometry.as_ref()).run()
}

/// Build the publish plan and persist it through `backend`
///
/// # Errors
/// As [`on_export_complete`], plus [`ExportError::SerializationBackend`]
/// when the backend fails; the backend has been rolled back by then.
pub fn publish(
    export: &TextureExport,
    config: &ExportConfig,
    backend: &mut dyn SerializationBackend,
) -> ExportResult<PublishPlan> {
    let materials = prepare(export, config)?;
    let mut engine = LayeringEngine::new(config, materials, export.geometry.as_ref());
    engine.build_graphs()?;
    engine.resolve_paths()?;
    engine.compose()?;
    engine.persist(backend)?;
    engine.into_plan()
}

fn prepare(export: &TextureExport, config: &ExportConfig) -> ExportResult<IndexMap<String, MaterialDescriptor>> {
    host::preflight(config.host_version)?;
    config.validate()?;

    let report = TextureBundleParser::parse_with_report(&export.textures, &export.mesh_names);
    if !report.skipped.is_empty() {
        log::info!(
            "Skipped {} of {} texture entries or materials",
            report.skipped.len(),
            export.textures.len()
        );
    }
    if report.materials.is_empty() {
        return Err(ExportError::NoMaterials(export.textures.len()));
    }
    Ok(report.materials)
}

/// Common imports for host integrations
pub mod prelude {
    pub use crate::{
        assets::{classify, MaterialDescriptor, RawTexture, TextureSlot},
        config::{BackendFlags, CollisionPolicy, Config, DisplacementMode, ExportConfig},
        error::{ExportError, ExportResult},
        host::HostVersion,
        on_export_complete, publish,
        publish::{GeometryManifest, PublishPlan, SerializationBackend},
        shading::Backend,
        TextureExport,
    };
}
