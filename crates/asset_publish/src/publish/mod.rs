//! Asset structure and layering
//!
//! Turns built shader graphs into a layered publish: texture relocation,
//! binding resolution, the publish plan and its persistence through an
//! external serialization backend.

pub mod binding;
pub mod engine;
pub mod paths;
pub mod plan;
pub mod relocation;
pub mod serializer;

pub use binding::{resolve_bindings, BindingResolution, GeometryManifest};
pub use engine::{ExportStage, LayeringEngine};
pub use paths::PublishPaths;
pub use plan::{
    BindingTarget, EntryLayer, GeometryLayer, LayerContent, MaterialBinding, MaterialLayer, MaterialPrim, MaterialTerminal,
    PayloadLayer, PublishPlan, StageMetadata,
};
pub use relocation::{PreviewSettings, RelocationTable, TextureCopyRequest, TextureRelocationMap};
pub use serializer::{MemoryBackend, SerializationBackend, StagedWrite, StagedWrites};
