//! Texture slot classification
//!
//! Maps exported texture file names to semantic material channels by
//! looking for well-known tokens between non-alphanumeric boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic material channel a texture feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSlot {
    /// Albedo / diffuse color
    BaseColor,
    /// Metallic mask
    Metalness,
    /// Specular roughness
    Roughness,
    /// Tangent-space normal map
    Normal,
    /// Cut-out / transparency
    Opacity,
    /// Ambient occlusion
    Occlusion,
    /// Height / displacement
    Displacement,
}

/// Tokens recognised per slot, in precedence order
const SLOT_TOKENS: [(TextureSlot, &[&str]); 7] = [
    (TextureSlot::BaseColor, &["base_color", "basecolor", "albedo", "diffuse"]),
    (TextureSlot::Metalness, &["metallic", "metalness"]),
    (TextureSlot::Roughness, &["roughness"]),
    (TextureSlot::Normal, &["normal"]),
    (TextureSlot::Opacity, &["opacity", "alpha"]),
    (TextureSlot::Occlusion, &["occlusion", "ao"]),
    (TextureSlot::Displacement, &["height", "displacement"]),
];

impl TextureSlot {
    /// All slots in precedence order
    pub const ALL: [Self; 7] = [
        Self::BaseColor,
        Self::Metalness,
        Self::Roughness,
        Self::Normal,
        Self::Opacity,
        Self::Occlusion,
        Self::Displacement,
    ];

    /// Stable lowercase name, used in node names and logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BaseColor => "basecolor",
            Self::Metalness => "metalness",
            Self::Roughness => "roughness",
            Self::Normal => "normal",
            Self::Opacity => "opacity",
            Self::Occlusion => "occlusion",
            Self::Displacement => "displacement",
        }
    }

    /// Whether the slot carries color data rather than raw values
    pub const fn is_color(self) -> bool {
        matches!(self, Self::BaseColor)
    }

    /// Classify a texture file name or path
    ///
    /// Matching is case-insensitive and only accepts a token flanked by
    /// non-alphanumeric characters or the ends of the string, so `road`
    /// never reads as `ao`. Total and side-effect free.
    ///
    /// # Arguments
    /// * `filename` - File name or full path of an exported texture
    ///
    /// # Returns
    /// The first slot whose token matches, or `None`
    pub fn classify(filename: &str) -> Option<Self> {
        let lowered = filename.to_lowercase();
        SLOT_TOKENS
            .iter()
            .find(|(_, tokens)| tokens.iter().any(|token| contains_token(&lowered, token)))
            .map(|(slot, _)| *slot)
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`TextureSlot::classify`]
pub fn classify(filename: &str) -> Option<TextureSlot> {
    TextureSlot::classify(filename)
}

/// Find `token` in `haystack` with non-alphanumeric characters on both sides
fn contains_token(haystack: &str, token: &str) -> bool {
    let is_boundary = |c: Option<char>| c.map_or(true, |c| !c.is_ascii_alphanumeric());
    haystack.match_indices(token).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        is_boundary(before) && is_boundary(after)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_common_exports() {
        assert_eq!(classify("tex_Body_BaseColor.png"), Some(TextureSlot::BaseColor));
        assert_eq!(classify("Body_Base_Color.1001.exr"), Some(TextureSlot::BaseColor));
        assert_eq!(classify("body_albedo.tif"), Some(TextureSlot::BaseColor));
        assert_eq!(classify("Body_Metallic.png"), Some(TextureSlot::Metalness));
        assert_eq!(classify("Body_Roughness.png"), Some(TextureSlot::Roughness));
        assert_eq!(classify("Body_Normal.png"), Some(TextureSlot::Normal));
        assert_eq!(classify("Body_Opacity.png"), Some(TextureSlot::Opacity));
        assert_eq!(classify("Body_AO.png"), Some(TextureSlot::Occlusion));
        assert_eq!(classify("Body_Height.png"), Some(TextureSlot::Displacement));
    }

    #[test]
    fn test_road_is_not_occlusion() {
        assert_eq!(classify("asset_road_02.png"), None);
        assert_eq!(classify("roadside_roughness.png"), Some(TextureSlot::Roughness));
        assert_ne!(classify("Road_Normal.png"), Some(TextureSlot::Occlusion));
    }

    #[test]
    fn test_standalone_ao_is_occlusion() {
        assert_eq!(classify("mat_ao.png"), Some(TextureSlot::Occlusion));
        assert_eq!(classify("/exports/ao"), Some(TextureSlot::Occlusion));
        assert_eq!(classify("mat-AO-01.tga"), Some(TextureSlot::Occlusion));
    }

    #[test]
    fn test_token_must_be_whole() {
        assert_eq!(classify("abnormality.png"), None);
        assert_eq!(classify("normals.png"), None);
        assert_eq!(classify("normalmap.png"), None);
    }

    #[test]
    fn test_precedence_prefers_base_color() {
        // Both tokens present: base color is checked first.
        assert_eq!(classify("diffuse_roughness.png"), Some(TextureSlot::BaseColor));
        assert_eq!(classify("metallic_roughness.png"), Some(TextureSlot::Metalness));
    }

    #[test]
    fn test_directory_tokens_count() {
        assert_eq!(classify("/textures/normal/body.png"), Some(TextureSlot::Normal));
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("Body_Emissive.png"), None);
        assert_eq!(classify("___"), None);
    }
}
