//! Layering engine
//!
//! Drives one export through
//! `Collecting -> GraphsBuilt -> PathsResolved -> Composed -> Persisted`.
//! Each step checks it runs at the right stage, so a plan can never be
//! composed from graphs whose texture paths are still open.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::binding::{resolve_bindings, GeometryManifest};
use super::paths::{PublishPaths, GEOMETRY_FILE, MATERIAL_FILE, PAYLOAD_FILE};
use super::plan::{
    BindingTarget, EntryLayer, GeometryLayer, MaterialBinding, MaterialLayer, MaterialPrim, MaterialTerminal, PayloadLayer,
    PublishPlan, StageMetadata,
};
use super::relocation::{PreviewSettings, RelocationTable, TextureRelocationMap};
use super::serializer::{SerializationBackend, StagedWrites};
use crate::assets::MaterialDescriptor;
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::material::sanitize_identifier;
use crate::shading::{build_material_graph, Backend, BuildOptions, ShaderGraph};

const MATERIAL_VARIANT_SET: &str = "mtl";
const MATERIAL_VARIANT: &str = "default";
const ASSET_KIND: &str = "component";

/// Stage of one export invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExportStage {
    /// Inputs and options gathered
    Collecting,
    /// Every enabled backend built for every material
    GraphsBuilt,
    /// Texture destinations assigned and written into the graphs
    PathsResolved,
    /// Publish plan assembled
    Composed,
    /// Plan handed to the serialization backend, successfully or not
    Persisted,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collecting => "Collecting",
            Self::GraphsBuilt => "GraphsBuilt",
            Self::PathsResolved => "PathsResolved",
            Self::Composed => "Composed",
            Self::Persisted => "Persisted",
        };
        f.write_str(name)
    }
}

/// Composes builder output into a layered publish
pub struct LayeringEngine<'a> {
    config: &'a ExportConfig,
    geometry: Option<&'a GeometryManifest>,
    paths: PublishPaths,
    options: BuildOptions,
    stage: ExportStage,
    materials: IndexMap<String, MaterialDescriptor>,
    prim_names: IndexMap<String, String>,
    graphs: IndexMap<String, Vec<ShaderGraph>>,
    relocations: TextureRelocationMap,
    relocation_table: RelocationTable,
    plan: Option<PublishPlan>,
}

impl<'a> LayeringEngine<'a> {
    /// Start collecting an export
    ///
    /// # Arguments
    /// * `config` - Validated export configuration
    /// * `materials` - Parsed, non-empty materials in export order
    /// * `geometry` - Authored geometry components, if the host reported them
    pub fn new(
        config: &'a ExportConfig,
        materials: IndexMap<String, MaterialDescriptor>,
        geometry: Option<&'a GeometryManifest>,
    ) -> Self {
        let paths = PublishPaths::from_config(config);
        let prim_names = unique_prim_names(materials.keys());
        log::info!(
            "Collecting export of '{}': {} material(s), backends {:?}",
            paths.asset_name,
            materials.len(),
            config.backends().backends().map(Backend::key).collect::<Vec<_>>()
        );

        Self {
            config,
            geometry,
            paths,
            options: BuildOptions::from_config(config),
            stage: ExportStage::Collecting,
            materials,
            prim_names,
            graphs: IndexMap::new(),
            relocations: TextureRelocationMap::new(),
            relocation_table: RelocationTable::default(),
            plan: None,
        }
    }

    /// Current stage
    pub const fn stage(&self) -> ExportStage {
        self.stage
    }

    /// Publish layout
    pub const fn paths(&self) -> &PublishPaths {
        &self.paths
    }

    /// Unique prim name of a material
    pub fn prim_name(&self, material: &str) -> Option<&str> {
        self.prim_names.get(material).map(String::as_str)
    }

    /// Built graphs of a material, in backend order
    pub fn graphs(&self, material: &str) -> Option<&[ShaderGraph]> {
        self.graphs.get(material).map(Vec::as_slice)
    }

    /// Composed plan, once the export reached [`ExportStage::Composed`]
    pub const fn plan(&self) -> Option<&PublishPlan> {
        self.plan.as_ref()
    }

    /// Build every enabled backend for every material
    ///
    /// Each graph is validated as it is built and every texture it reads is
    /// registered with the relocation map.
    pub fn build_graphs(&mut self) -> ExportResult<()> {
        self.expect_stage(ExportStage::Collecting)?;
        let backends: Vec<Backend> = self.config.backends().backends().collect();

        for (name, material) in &self.materials {
            let material_prim = self.paths.material_prim(prim_or_name(&self.prim_names, name));
            let mut graphs = Vec::with_capacity(backends.len());
            for &backend in &backends {
                let graph_path = format!("{material_prim}/{}", backend.node_graph_name());
                let graph = build_material_graph(material, backend, self.config.format_override(backend), self.options)
                    .map_err(|err| ExportError::from_graph(&graph_path, err))?;
                graph
                    .validate()
                    .map_err(|err| ExportError::from_graph(&graph_path, err))?;
                for asset in graph.assets() {
                    self.relocations.register(asset);
                }
                log::debug!("Built {graph_path} with {} node(s)", graph.node_count());
                graphs.push(graph);
            }
            self.graphs.insert(name.clone(), graphs);
        }

        self.advance(ExportStage::GraphsBuilt);
        Ok(())
    }

    /// Assign texture destinations and write them into the graphs
    pub fn resolve_paths(&mut self) -> ExportResult<()> {
        self.expect_stage(ExportStage::GraphsBuilt)?;
        let preview = PreviewSettings {
            max_resolution: self.config.preview_texture_max_resolution,
            format: self.config.preview_texture_format,
        };
        let table = self.relocations.resolve(
            &self.paths,
            self.config.relocation_collision,
            preview,
            &self.prim_names,
        )?;

        for graph in self.graphs.values_mut().flatten() {
            for asset in graph.assets_mut() {
                let resolved = table.layer_path(&self.paths, asset)?;
                asset.resolved_destination_path = Some(resolved);
            }
        }
        log::info!("Relocating {} texture file(s)", table.len());

        self.relocation_table = table;
        self.advance(ExportStage::PathsResolved);
        Ok(())
    }

    /// Assemble the publish plan
    pub fn compose(&mut self) -> ExportResult<&PublishPlan> {
        self.expect_stage(ExportStage::PathsResolved)?;
        let paths = &self.paths;
        let metadata = StageMetadata::default();

        let bindings = resolve_bindings(
            &self.materials,
            paths,
            self.geometry,
            &self.config.naming_convention,
        );

        let materials: Vec<MaterialPrim> = self
            .graphs
            .iter()
            .map(|(name, graphs)| {
                let path = paths.material_prim(prim_or_name(&self.prim_names, name));
                let terminals = graphs
                    .iter()
                    .flat_map(|graph| {
                        let graph_prim = format!("{path}/{}", graph.name());
                        graph.outputs().map(move |(output, port)| MaterialTerminal {
                            name: graph.backend.terminal(output),
                            source: format!("{graph_prim}.outputs:{output}"),
                            value_type: port.value_type,
                        })
                    })
                    .collect();
                MaterialPrim {
                    name: name.clone(),
                    path,
                    terminals,
                    graphs: graphs.clone(),
                }
            })
            .collect();

        let material_bindings = bindings
            .binding_map
            .iter()
            .map(|(name, targets)| MaterialBinding {
                material: paths.material_prim(prim_or_name(&self.prim_names, name)),
                targets: targets
                    .iter()
                    .map(|target| BindingTarget {
                        path: target.clone(),
                        authored: bindings.authored_paths.get(target).cloned(),
                    })
                    .collect(),
            })
            .collect();

        let geometry_layer = self.config.save_geometry.then(|| {
            let has_proxy = self.geometry.is_some_and(|geometry| geometry.has_proxy);
            GeometryLayer {
                path: paths.geometry_file(),
                metadata: metadata.clone(),
                default_prim: paths.root_prim(),
                render_scope: paths.render_scope(),
                proxy_scope: has_proxy.then(|| paths.proxy_scope()),
                reference: self.config.geometry_source.clone(),
                components: self
                    .geometry
                    .map(|geometry| geometry.components.clone())
                    .unwrap_or_default(),
            }
        });

        let mut sublayers = Vec::with_capacity(2);
        if geometry_layer.is_some() {
            sublayers.push(format!("./{GEOMETRY_FILE}"));
        } else if let Some(source) = &self.config.geometry_source {
            sublayers.push(paths.layer_relative(source));
        }
        sublayers.push(format!("./{MATERIAL_FILE}"));

        let plan = PublishPlan {
            asset_name: paths.asset_name.clone(),
            asset_dir: paths.asset_dir.clone(),
            entry_file: EntryLayer {
                path: paths.entry_file(),
                metadata: metadata.clone(),
                default_prim: paths.root_prim(),
                kind: ASSET_KIND.to_string(),
                asset_name: paths.asset_name.clone(),
                asset_identifier: paths.entry_identifier(),
                inherits: paths.class_prim(),
                payload: format!("./{PAYLOAD_FILE}"),
            },
            geometry_layer,
            material_layer: MaterialLayer {
                path: paths.material_file(),
                metadata: metadata.clone(),
                default_prim: paths.root_prim(),
                scope: paths.materials_scope(),
                variant_set: MATERIAL_VARIANT_SET.to_string(),
                variant: MATERIAL_VARIANT.to_string(),
                materials,
                bindings: material_bindings,
            },
            payload_layer: PayloadLayer {
                path: paths.payload_file(),
                metadata,
                default_prim: paths.root_prim(),
                sublayers,
            },
            texture_relocation_map: self.relocation_table.clone(),
            binding_map: bindings.binding_map,
            authored_paths: bindings.authored_paths,
        };

        log::info!(
            "Composed '{}': {} material(s), {} binding(s), {} texture file(s)",
            plan.asset_name,
            plan.material_layer.materials.len(),
            plan.binding_map.len(),
            plan.texture_relocation_map.len()
        );
        self.advance(ExportStage::Composed);
        Ok(self.plan.insert(plan))
    }

    /// Hand the composed plan to a serialization backend
    ///
    /// The export is [`ExportStage::Persisted`] afterwards whatever the
    /// outcome; a failed write is not retried.
    pub fn persist(&mut self, backend: &mut dyn SerializationBackend) -> ExportResult<()> {
        self.expect_stage(ExportStage::Composed)?;
        let writes = match &self.plan {
            Some(plan) => StagedWrites::from_plan(plan),
            None => {
                return Err(ExportError::StageOrder {
                    expected: ExportStage::Composed,
                    found: self.stage,
                })
            }
        };

        let result = writes.replay(backend);
        self.advance(ExportStage::Persisted);
        result?;
        log::info!("Published '{}' to {}", self.paths.asset_name, self.paths.asset_dir.display());
        Ok(())
    }

    /// Run up to [`ExportStage::Composed`] and return the plan
    pub fn run(mut self) -> ExportResult<PublishPlan> {
        self.build_graphs()?;
        self.resolve_paths()?;
        self.compose()?;
        self.into_plan()
    }

    /// Take the composed plan
    pub fn into_plan(self) -> ExportResult<PublishPlan> {
        let found = self.stage;
        self.plan.ok_or(ExportError::StageOrder {
            expected: ExportStage::Composed,
            found,
        })
    }

    fn expect_stage(&self, expected: ExportStage) -> ExportResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(ExportError::StageOrder {
                expected,
                found: self.stage,
            })
        }
    }

    fn advance(&mut self, next: ExportStage) {
        log::info!("Export '{}': {} -> {}", self.paths.asset_name, self.stage, next);
        self.stage = next;
    }
}

fn prim_or_name<'n>(prim_names: &'n IndexMap<String, String>, name: &'n str) -> &'n str {
    prim_names.get(name).map_or(name, String::as_str)
}

/// Sanitized prim names, made unique with `_1`, `_2`, ... in input order
fn unique_prim_names<'n>(names: impl Iterator<Item = &'n String>) -> IndexMap<String, String> {
    let mut taken = IndexSet::new();
    let mut prim_names = IndexMap::new();
    for name in names {
        let base = sanitize_identifier(name);
        let mut candidate = base.clone();
        let mut suffix = 0;
        while taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        if suffix > 0 {
            log::warn!("Material '{name}' authored as '{candidate}' to keep prim names unique");
        }
        taken.insert(candidate.clone());
        prim_names.insert(name.clone(), candidate);
    }
    prim_names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{RawTexture, TextureBundleParser};
    use crate::config::{BackendFlags, CollisionPolicy};
    use crate::publish::serializer::MemoryBackend;
    use crate::shading::SURFACE_OUTPUT;

    fn body_materials() -> IndexMap<String, MaterialDescriptor> {
        TextureBundleParser::parse(&[
            RawTexture::new("Body", "", "/tex/tex_Body_BaseColor.png"),
            RawTexture::new("Body", "", "/tex/tex_Body_Roughness.png"),
            RawTexture::new("Glass", "", "/tex/tex_Glass_Opacity.png"),
        ])
    }

    fn config() -> ExportConfig {
        ExportConfig::new("Hero", "/publish")
    }

    #[test]
    fn test_stage_order() {
        let config = config();
        let mut engine = LayeringEngine::new(&config, body_materials(), None);
        assert_eq!(engine.stage(), ExportStage::Collecting);

        assert!(matches!(
            engine.compose(),
            Err(ExportError::StageOrder {
                expected: ExportStage::PathsResolved,
                found: ExportStage::Collecting
            })
        ));

        engine.build_graphs().unwrap();
        assert_eq!(engine.stage(), ExportStage::GraphsBuilt);
        engine.resolve_paths().unwrap();
        assert_eq!(engine.stage(), ExportStage::PathsResolved);
        engine.compose().unwrap();
        assert_eq!(engine.stage(), ExportStage::Composed);
        engine.persist(&mut MemoryBackend::new()).unwrap();
        assert_eq!(engine.stage(), ExportStage::Persisted);
    }

    #[test]
    fn test_every_texture_path_is_resolved() {
        let config = config();
        let mut engine = LayeringEngine::new(&config, body_materials(), None);
        engine.build_graphs().unwrap();
        engine.resolve_paths().unwrap();

        for graph in engine.graphs("Body").unwrap() {
            assert!(graph.assets().all(|asset| asset.is_resolved()));
        }
        let preview = &engine.graphs("Body").unwrap()[0];
        assert_eq!(preview.backend, Backend::Preview);
        let paths: Vec<_> = preview
            .assets()
            .filter_map(|asset| asset.resolved_destination_path.as_deref())
            .collect();
        assert!(paths.contains(&"./textures/previewTextures/Body_BaseColor.jpg"));
        assert!(paths.contains(&"./textures/tex_Body_Roughness.png"));
    }

    #[test]
    fn test_terminals_per_backend() {
        let config = config().with_backends(BackendFlags::all());
        let plan = LayeringEngine::new(&config, body_materials(), None).run().unwrap();
        let body = plan.material("Body").unwrap();

        let names: Vec<_> = body.terminals.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["surface", "mtlx:surface", "openpbr:surface", "arnold:surface"]);
        assert_eq!(body.path, "/Hero/mtl/Body");
        assert_eq!(body.terminals[1].source, format!("/Hero/mtl/Body/MtlxNodeGraph.outputs:{SURFACE_OUTPUT}"));
    }

    #[test]
    fn test_layer_structure() {
        let config = config().with_geometry(Some("/scenes/hero_geo.usd".into()), true);
        let geometry = GeometryManifest {
            components: vec!["Body".into()],
            has_proxy: true,
        };
        let plan = LayeringEngine::new(&config, body_materials(), Some(&geometry)).run().unwrap();

        assert_eq!(plan.entry_file.default_prim, "/Hero");
        assert_eq!(plan.entry_file.asset_identifier, "./Hero.usd");
        assert_eq!(plan.entry_file.inherits, "/__class__/Hero");
        assert_eq!(plan.entry_file.payload, "./payload.usdc");
        assert_eq!(plan.payload_layer.sublayers, vec!["./geo.usdc".to_string(), "./mtl.usdc".to_string()]);

        let geo = plan.geometry_layer.as_ref().unwrap();
        assert_eq!(geo.proxy_scope.as_deref(), Some("/Hero/geo/proxy"));
        assert_eq!(geo.reference.as_deref(), Some(std::path::Path::new("/scenes/hero_geo.usd")));
        assert_eq!(plan.material_layer.variant_set, "mtl");
        assert_eq!(plan.material_layer.variant, "default");
        assert_eq!(plan.entry_file.metadata.up_axis, "Y");
    }

    #[test]
    fn test_geometry_layer_without_proxy_has_no_proxy_scope() {
        let config = config().with_geometry(None, true);
        let plan = LayeringEngine::new(&config, body_materials(), None).run().unwrap();

        let geo = plan.geometry_layer.as_ref().unwrap();
        assert_eq!(geo.render_scope, "/Hero/geo/render");
        assert!(geo.proxy_scope.is_none());
        assert!(geo.reference.is_none());
    }

    #[test]
    fn test_no_geometry_layer_unless_saved() {
        let config = config();
        let plan = LayeringEngine::new(&config, body_materials(), None).run().unwrap();
        assert!(plan.geometry_layer.is_none());
        assert_eq!(plan.payload_layer.sublayers, vec!["./mtl.usdc".to_string()]);
        assert_eq!(plan.layers().len(), 3);
    }

    #[test]
    fn test_prim_names_are_unique() {
        let names = ["Body Paint".to_string(), "Body_Paint".to_string(), "Body-Paint".to_string()];
        let prims = unique_prim_names(names.iter());
        let values: Vec<_> = prims.values().map(String::as_str).collect();
        assert_eq!(values, vec!["Body_Paint", "Body_Paint_1", "Body_Paint_2"]);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let config = config();
        let mut engine = LayeringEngine::new(&config, body_materials(), None);
        engine.build_graphs().unwrap();
        engine.resolve_paths().unwrap();
        engine.compose().unwrap();

        let mut backend = MemoryBackend::failing_on("/publish/Hero/mtl.usdc");
        let err = engine.persist(&mut backend).unwrap_err();

        assert!(matches!(err, ExportError::SerializationBackend { .. }));
        assert_eq!(backend.rollbacks, 1);
        assert!(backend.pending.is_empty());
        assert!(backend.committed.is_empty());
        assert_eq!(engine.stage(), ExportStage::Persisted);
    }

    #[test]
    fn test_successful_persist_writes_textures_before_layers() {
        let config = config();
        let mut engine = LayeringEngine::new(&config, body_materials(), None);
        engine.build_graphs().unwrap();
        engine.resolve_paths().unwrap();
        let plan = engine.compose().unwrap().clone();

        let writes = StagedWrites::from_plan(&plan);
        let mut backend = MemoryBackend::new();
        engine.persist(&mut backend).unwrap();

        assert_eq!(backend.committed.len(), writes.len());
        assert_eq!(backend.committed.last(), Some(&plan.entry_file.path));
        let first_layer = backend
            .committed
            .iter()
            .position(|path| path.extension().is_some_and(|ext| ext == "usdc" || ext == "usd"))
            .unwrap();
        assert_eq!(first_layer, plan.texture_relocation_map.len());
    }

    #[test]
    fn test_collision_fail_policy_stops_before_compose() {
        let mut config = config();
        config.relocation_collision = CollisionPolicy::Fail;
        let materials = TextureBundleParser::parse(&[
            RawTexture::new("A", "", "/one/BaseColor.png"),
            RawTexture::new("B", "", "/two/BaseColor.png"),
        ]);
        let mut engine = LayeringEngine::new(&config, materials, None);
        engine.build_graphs().unwrap();
        assert!(matches!(engine.resolve_paths(), Err(ExportError::PathCollision { .. })));
        assert_eq!(engine.stage(), ExportStage::GraphsBuilt);
    }
}
