//! Publish plan
//!
//! Everything the serialization backend needs to write one asset, as plain
//! data. The plan is produced once per export and never modified afterwards.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::relocation::RelocationTable;
use crate::shading::{ShaderGraph, ValueType};

/// Stage-level metadata written on every layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    /// Up axis token
    pub up_axis: String,
    /// Scene units in meters
    pub meters_per_unit: f64,
    /// Playback rate
    pub frames_per_second: f64,
    /// Time code rate
    pub time_codes_per_second: f64,
}

impl Default for StageMetadata {
    fn default() -> Self {
        Self {
            up_axis: "Y".to_string(),
            meters_per_unit: 1.0,
            frames_per_second: 24.0,
            time_codes_per_second: 24.0,
        }
    }
}

/// `<Asset>.usd`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLayer {
    /// File on disk
    pub path: PathBuf,
    /// Stage metadata
    pub metadata: StageMetadata,
    /// Default prim, `/<Asset>`
    pub default_prim: String,
    /// Model kind of the default prim
    pub kind: String,
    /// `assetInfo:name`
    pub asset_name: String,
    /// `assetInfo:identifier`
    pub asset_identifier: String,
    /// Class the root prim inherits from
    pub inherits: String,
    /// Payload arc on the root prim
    pub payload: String,
}

/// `payload.usdc`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadLayer {
    /// File on disk
    pub path: PathBuf,
    /// Stage metadata
    pub metadata: StageMetadata,
    /// Default prim
    pub default_prim: String,
    /// Composed layers, weakest first: later entries override earlier ones
    pub sublayers: Vec<String>,
}

/// `geo.usdc`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryLayer {
    /// File on disk
    pub path: PathBuf,
    /// Stage metadata
    pub metadata: StageMetadata,
    /// Default prim
    pub default_prim: String,
    /// Render purpose scope
    pub render_scope: String,
    /// Proxy purpose scope, when proxy geometry exists; the render scope's
    /// `proxyPrim` relationship targets it
    pub proxy_scope: Option<String>,
    /// Geometry file referenced into the geometry scope
    pub reference: Option<PathBuf>,
    /// Authored component names
    pub components: Vec<String>,
}

/// Material output wired to a node graph output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialTerminal {
    /// Output name on the material, e.g. `mtlx:surface`
    pub name: String,
    /// Connected attribute, `<graph prim>.outputs:<output>`
    pub source: String,
    /// Declared type
    pub value_type: ValueType,
}

/// One material prim and its backend graphs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPrim {
    /// Material name as exported
    pub name: String,
    /// Prim path, `/<Asset>/mtl/<Material>`
    pub path: String,
    /// Backend terminals on the material
    pub terminals: Vec<MaterialTerminal>,
    /// Node graphs, one per enabled backend
    pub graphs: Vec<ShaderGraph>,
}

/// One geometry prim a material is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingTarget {
    /// Normalized prim path, `/<Asset>/geo/render/Head`
    pub path: String,
    /// Prim actually authored in the geometry, `/<Asset>/geo/render/Head_01`,
    /// when the host reported its components
    pub authored: Option<String>,
}

impl BindingTarget {
    /// Prim the binding relationship should point at
    pub fn prim(&self) -> &str {
        self.authored.as_deref().unwrap_or(&self.path)
    }
}

/// Material bound to a list of geometry prims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialBinding {
    /// Material prim path
    pub material: String,
    /// Bound geometry prims
    pub targets: Vec<BindingTarget>,
}

/// `mtl.usdc`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLayer {
    /// File on disk
    pub path: PathBuf,
    /// Stage metadata
    pub metadata: StageMetadata,
    /// Default prim
    pub default_prim: String,
    /// Scope holding every material
    pub scope: String,
    /// Variant set wrapping the materials
    pub variant_set: String,
    /// Selected variant
    pub variant: String,
    /// Materials in export order
    pub materials: Vec<MaterialPrim>,
    /// Bindings authored next to the materials
    pub bindings: Vec<MaterialBinding>,
}

/// Contents of one layer file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerContent {
    /// Entry layer
    Entry(EntryLayer),
    /// Payload layer
    Payload(PayloadLayer),
    /// Material layer
    Material(MaterialLayer),
    /// Geometry layer
    Geometry(GeometryLayer),
}

impl LayerContent {
    /// File the layer is written to
    pub fn path(&self) -> &Path {
        match self {
            Self::Entry(layer) => layer.path.as_path(),
            Self::Payload(layer) => layer.path.as_path(),
            Self::Material(layer) => layer.path.as_path(),
            Self::Geometry(layer) => layer.path.as_path(),
        }
    }
}

/// Layered publish description for one export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishPlan {
    /// Prim-safe asset name
    pub asset_name: String,
    /// `<publish_root>/<Asset>`
    pub asset_dir: PathBuf,
    /// Entry layer
    pub entry_file: EntryLayer,
    /// Geometry layer, only when geometry is saved
    pub geometry_layer: Option<GeometryLayer>,
    /// Material layer
    pub material_layer: MaterialLayer,
    /// Payload layer
    pub payload_layer: PayloadLayer,
    /// Where every texture file ends up
    pub texture_relocation_map: RelocationTable,
    /// Material name to bound prim paths
    pub binding_map: IndexMap<String, Vec<String>>,
    /// Normalized binding path to the authored prim it resolves to
    pub authored_paths: IndexMap<String, String>,
}

impl PublishPlan {
    /// Layers in write order: dependencies before the layers that use them
    pub fn layers(&self) -> Vec<LayerContent> {
        let mut layers = Vec::with_capacity(4);
        if let Some(geometry) = &self.geometry_layer {
            layers.push(LayerContent::Geometry(geometry.clone()));
        }
        layers.push(LayerContent::Material(self.material_layer.clone()));
        layers.push(LayerContent::Payload(self.payload_layer.clone()));
        layers.push(LayerContent::Entry(self.entry_file.clone()));
        layers
    }

    /// Material prim by exported name
    pub fn material(&self, name: &str) -> Option<&MaterialPrim> {
        self.material_layer.materials.iter().find(|material| material.name == name)
    }

    /// Every graph of every material
    pub fn graphs(&self) -> impl Iterator<Item = &ShaderGraph> {
        self.material_layer.materials.iter().flat_map(|material| material.graphs.iter())
    }
}
