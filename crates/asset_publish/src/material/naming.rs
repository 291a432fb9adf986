//! Name handling for materials and geometry components

use serde::{Deserialize, Serialize};

/// Name fragments that mark a see-through material
const TRANSMISSIVE_TOKENS: [&str; 2] = ["glass", "glas"];

/// Prefixes and suffixes DCC tools add to material names
///
/// Stripped before a material is matched against geometry by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    /// Removed from the start of a name, in order
    pub strip_prefixes: Vec<String>,
    /// Removed from the end of a name, in order, before prefixes
    pub strip_suffixes: Vec<String>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            strip_prefixes: ["mat_", "material_", "M_"].map(String::from).to_vec(),
            strip_suffixes: ["_ShaderSG", "_collect", "_MAT", "_mtl", "_SG"].map(String::from).to_vec(),
        }
    }
}

impl NamingConvention {
    /// Strip known suffixes then known prefixes
    ///
    /// Returns the raw name unchanged when stripping would leave nothing.
    pub fn clean_material_name<'a>(&self, raw_name: &'a str) -> &'a str {
        let mut name = raw_name;
        for suffix in &self.strip_suffixes {
            if let Some(stripped) = name.strip_suffix(suffix.as_str()) {
                name = stripped;
            }
        }
        for prefix in &self.strip_prefixes {
            if let Some(stripped) = name.strip_prefix(prefix.as_str()) {
                name = stripped;
            }
        }
        if name.is_empty() {
            raw_name
        } else {
            name
        }
    }
}

/// Turn an arbitrary string into a valid prim identifier
///
/// Characters outside `[A-Za-z0-9_]` become `_`, runs of them collapse into
/// one, and a leading digit gets an underscore in front.
pub fn sanitize_identifier(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut replacing = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            sanitized.push(c);
            replacing = false;
        } else if !replacing {
            sanitized.push('_');
            replacing = true;
        }
    }
    if sanitized.is_empty() {
        return "_".to_string();
    }
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

/// Strip a trailing numeric disambiguation suffix such as `_01` or `.002`
///
/// `Head_01` and `Head.001` both normalise to `Head`. A name that is nothing
/// but digits is left alone.
pub fn normalize_component_name(name: &str) -> &str {
    let trimmed = name.trim();
    let without_digits = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == trimmed.len() {
        return trimmed;
    }
    match without_digits.strip_suffix(['_', '.']) {
        Some(stem) if !stem.is_empty() => stem,
        _ => trimmed,
    }
}

/// Whether a material name suggests glass
pub fn is_transmissive(material_name: &str) -> bool {
    let lowered = material_name.to_lowercase();
    TRANSMISSIVE_TOKENS.iter().any(|token| lowered.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_material_name() {
        let convention = NamingConvention::default();
        assert_eq!(convention.clean_material_name("Body"), "Body");
        assert_eq!(convention.clean_material_name("mat_Body_ShaderSG"), "Body");
        assert_eq!(convention.clean_material_name("mat_Body_collect"), "Body");
        assert_eq!(convention.clean_material_name("M_Rock_MAT"), "Rock");
        assert_eq!(convention.clean_material_name("mat_"), "mat_");
    }

    #[test]
    fn test_custom_convention() {
        let convention = NamingConvention {
            strip_prefixes: vec!["custom_".into()],
            strip_suffixes: vec!["_MAT".into()],
        };
        assert_eq!(convention.clean_material_name("custom_Body_MAT"), "Body");
        assert_eq!(convention.clean_material_name("mat_Body"), "mat_Body");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Body"), "Body");
        assert_eq!(sanitize_identifier("Car Paint (red)"), "Car_Paint_red_");
        assert_eq!(sanitize_identifier("01_metal"), "_01_metal");
        assert_eq!(sanitize_identifier("  "), "_");
    }

    #[test]
    fn test_normalize_component_name() {
        assert_eq!(normalize_component_name("Head_01"), "Head");
        assert_eq!(normalize_component_name("Head.001"), "Head");
        assert_eq!(normalize_component_name("Head"), "Head");
        assert_eq!(normalize_component_name("Head2"), "Head2");
        assert_eq!(normalize_component_name("_42"), "_42");
        assert_eq!(normalize_component_name("1234"), "1234");
    }

    #[test]
    fn test_transmissive_names() {
        assert!(is_transmissive("WindowGlass"));
        assert!(is_transmissive("Glas_Bottle"));
        assert!(!is_transmissive("Grass"));
    }
}
