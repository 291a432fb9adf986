//! Mesh to material binding resolution
//!
//! Materials that know their meshes bind to `/<Asset>/geo/render/<mesh>` and,
//! when proxy geometry exists, `/<Asset>/geo/proxy/<mesh>`. Materials without
//! mesh names bind by their own cleaned-up name. Either way the target is
//! the normalized component name, so `Head` still binds when the authored
//! prim is `Head_01`; the authored prim is recorded alongside.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::PublishPaths;
use crate::assets::MaterialDescriptor;
use crate::material::{normalize_component_name, sanitize_identifier, NamingConvention};

/// Geometry components the host authored, when it reports them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryManifest {
    /// Authored component prim names under the render scope
    pub components: Vec<String>,
    /// Proxy geometry mirrors the render components
    pub has_proxy: bool,
}

impl GeometryManifest {
    /// Authored component whose normalized name is `normalized`
    pub fn find_component(&self, normalized: &str) -> Option<&str> {
        let wanted = normalized.to_lowercase();
        self.components
            .iter()
            .find(|component| normalize_component_name(component).to_lowercase() == wanted)
            .map(String::as_str)
    }
}

/// Binding targets for every material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingResolution {
    /// Material name to bound prim paths
    pub binding_map: IndexMap<String, Vec<String>>,
    /// Normalized prim path to the authored prim it resolves to
    pub authored_paths: IndexMap<String, String>,
}

/// Resolve binding targets for `materials`
///
/// # Arguments
/// * `materials` - Parsed materials keyed by name
/// * `paths` - Publish layout
/// * `geometry` - Authored geometry, if the host reported it
/// * `naming` - Material name cleanup for the by-name fallback
pub fn resolve_bindings(
    materials: &IndexMap<String, MaterialDescriptor>,
    paths: &PublishPaths,
    geometry: Option<&GeometryManifest>,
    naming: &NamingConvention,
) -> BindingResolution {
    let has_proxy = geometry.is_some_and(|geometry| geometry.has_proxy);
    let mut resolution = BindingResolution::default();

    for (name, material) in materials {
        let meshes = binding_meshes(material, geometry, naming);
        if meshes.is_empty() {
            log::warn!("Material '{name}' matches no geometry component and is left unbound");
            continue;
        }

        let mut targets = Vec::new();
        let mut scopes = vec![paths.render_scope()];
        if has_proxy {
            scopes.push(paths.proxy_scope());
        }
        for scope in &scopes {
            for mesh in &meshes {
                let normalized = normalize_component_name(mesh);
                let target = format!("{scope}/{}", sanitize_identifier(normalized));
                let authored = geometry
                    .and_then(|geometry| geometry.find_component(normalized))
                    .map(|component| format!("{scope}/{}", sanitize_identifier(component)));
                if let Some(authored) = authored {
                    resolution.authored_paths.insert(target.clone(), authored);
                }
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        resolution.binding_map.insert(name.clone(), targets);
    }

    resolution
}

/// Meshes a material binds to, before scoping
fn binding_meshes(
    material: &MaterialDescriptor,
    geometry: Option<&GeometryManifest>,
    naming: &NamingConvention,
) -> IndexSet<String> {
    if !material.mesh_names.is_empty() {
        return material.mesh_names.clone();
    }

    let cleaned = naming.clean_material_name(&material.name);
    match geometry {
        // Without a manifest the convention is trusted blindly
        None => IndexSet::from([cleaned.to_string()]),
        Some(geometry) => geometry
            .find_component(normalize_component_name(cleaned))
            .map(|_| IndexSet::from([cleaned.to_string()]))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TextureBundle;

    fn materials(entries: &[(&str, &[&str])]) -> IndexMap<String, MaterialDescriptor> {
        entries
            .iter()
            .map(|(name, meshes)| {
                let material = MaterialDescriptor::new(*name, TextureBundle::new()).with_mesh_names(meshes.iter());
                ((*name).to_string(), material)
            })
            .collect()
    }

    fn paths() -> PublishPaths {
        PublishPaths::new("/publish", "Asset")
    }

    #[test]
    fn test_mesh_names_bind_render_and_proxy() {
        let geometry = GeometryManifest {
            components: vec!["Head_01".into(), "Body".into()],
            has_proxy: true,
        };
        let resolution = resolve_bindings(
            &materials(&[("Skin", &["Head", "Body"])]),
            &paths(),
            Some(&geometry),
            &NamingConvention::default(),
        );

        let targets = &resolution.binding_map["Skin"];
        for expected in [
            "/Asset/geo/render/Head",
            "/Asset/geo/render/Body",
            "/Asset/geo/proxy/Head",
            "/Asset/geo/proxy/Body",
        ] {
            assert!(targets.iter().any(|t| t == expected), "missing {expected}");
        }
        assert_eq!(resolution.authored_paths["/Asset/geo/render/Head"], "/Asset/geo/render/Head_01");
    }

    #[test]
    fn test_no_proxy_without_proxy_geometry() {
        let resolution = resolve_bindings(
            &materials(&[("Skin", &["Head"])]),
            &paths(),
            None,
            &NamingConvention::default(),
        );
        assert_eq!(resolution.binding_map["Skin"], vec!["/Asset/geo/render/Head".to_string()]);
    }

    #[test]
    fn test_name_fallback_uses_naming_convention() {
        let geometry = GeometryManifest {
            components: vec!["Wheel_002".into()],
            has_proxy: false,
        };
        let resolution = resolve_bindings(
            &materials(&[("Wheel_MAT", &[]), ("Ghost", &[])]),
            &paths(),
            Some(&geometry),
            &NamingConvention::default(),
        );

        assert_eq!(resolution.binding_map["Wheel_MAT"], vec!["/Asset/geo/render/Wheel".to_string()]);
        assert_eq!(resolution.authored_paths["/Asset/geo/render/Wheel"], "/Asset/geo/render/Wheel_002");
        assert!(!resolution.binding_map.contains_key("Ghost"));
    }

    #[test]
    fn test_name_fallback_without_manifest() {
        let resolution = resolve_bindings(
            &materials(&[("Body", &[])]),
            &paths(),
            None,
            &NamingConvention::default(),
        );
        assert_eq!(resolution.binding_map["Body"], vec!["/Asset/geo/render/Body".to_string()]);
        assert!(resolution.authored_paths.is_empty());
    }
}
