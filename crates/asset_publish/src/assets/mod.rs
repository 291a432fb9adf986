//! Exported texture intake
//!
//! Classification of texture files into material slots and grouping of the
//! host's raw texture list into per-material descriptors.

pub mod material_descriptor;
pub mod texture_parser;
pub mod texture_slot;

pub use material_descriptor::{MaterialDescriptor, TextureBundle};
pub use texture_parser::{ParseReport, RawTexture, SkipRecord, TextureBundleParser};
pub use texture_slot::{classify, TextureSlot};
