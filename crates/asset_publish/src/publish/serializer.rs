//! Serialization boundary
//!
//! The core never writes scene description itself. It hands every layer and
//! texture copy of a composed plan to a [`SerializationBackend`], staged so
//! nothing is written before composition has succeeded, and rolls the
//! backend back on the first failure.

use std::path::{Path, PathBuf};

use super::plan::{LayerContent, PublishPlan};
use super::relocation::TextureCopyRequest;
use crate::error::{BackendCause, ExportError, ExportResult};

/// Write-only scene description backend
pub trait SerializationBackend {
    /// Persist one layer file
    fn write_layer(&mut self, path: &Path, layer: &LayerContent) -> Result<(), BackendCause>;

    /// Copy, or resample for preview copies, one texture into the publish
    fn relocate_texture(&mut self, request: &TextureCopyRequest) -> Result<(), BackendCause>;

    /// Make every write so far visible
    fn commit(&mut self) -> Result<(), BackendCause>;

    /// Discard every write since the last commit
    fn rollback(&mut self);
}

/// One pending write
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    /// Texture copy
    Texture(TextureCopyRequest),
    /// Layer file
    Layer(LayerContent),
}

impl StagedWrite {
    /// Destination file of the write
    pub fn destination(&self) -> &Path {
        match self {
            Self::Texture(request) => &request.destination,
            Self::Layer(layer) => layer.path(),
        }
    }
}

/// Every write of a composed plan, in dependency order
///
/// Textures come first, then layers from geometry up to the entry layer, so
/// no layer is written before the files it points at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedWrites {
    writes: Vec<StagedWrite>,
}

impl StagedWrites {
    /// Stage the writes of a plan
    pub fn from_plan(plan: &PublishPlan) -> Self {
        let textures = plan
            .texture_relocation_map
            .requests()
            .into_iter()
            .map(StagedWrite::Texture);
        let layers = plan.layers().into_iter().map(StagedWrite::Layer);
        Self {
            writes: textures.chain(layers).collect(),
        }
    }

    /// Pending writes
    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    /// Number of pending writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True when nothing is staged
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Replay every write into `backend` and commit
    ///
    /// The first failure rolls the backend back and is returned as a single
    /// [`ExportError::SerializationBackend`].
    pub fn replay(&self, backend: &mut dyn SerializationBackend) -> ExportResult<()> {
        for write in &self.writes {
            let result = match write {
                StagedWrite::Texture(request) => backend.relocate_texture(request),
                StagedWrite::Layer(layer) => backend.write_layer(layer.path(), layer),
            };
            if let Err(cause) = result {
                return Err(Self::abort(backend, format!("writing {}", write.destination().display()), cause));
            }
        }
        backend
            .commit()
            .map_err(|cause| Self::abort(backend, "committing publish".to_string(), cause))
    }

    fn abort(backend: &mut dyn SerializationBackend, context: String, cause: BackendCause) -> ExportError {
        log::error!("Publish failed while {context}: {cause}; rolling back");
        backend.rollback();
        ExportError::backend(context, cause)
    }
}

/// In-memory backend recording what it was asked to write
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Writes not yet committed
    pub pending: Vec<PathBuf>,
    /// Committed writes
    pub committed: Vec<PathBuf>,
    /// Layers committed so far
    pub layers: Vec<LayerContent>,
    staged_layers: Vec<LayerContent>,
    /// Fail when asked to write this file
    pub fail_on: Option<PathBuf>,
    /// Number of rollbacks performed
    pub rollbacks: usize,
}

impl MemoryBackend {
    /// Backend that accepts every write
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that fails on a given destination
    pub fn failing_on(path: impl Into<PathBuf>) -> Self {
        Self {
            fail_on: Some(path.into()),
            ..Self::default()
        }
    }

    fn record(&mut self, path: &Path) -> Result<(), BackendCause> {
        if self.fail_on.as_deref() == Some(path) {
            return Err(format!("refusing to write {}", path.display()).into());
        }
        self.pending.push(path.to_path_buf());
        Ok(())
    }
}

impl SerializationBackend for MemoryBackend {
    fn write_layer(&mut self, path: &Path, layer: &LayerContent) -> Result<(), BackendCause> {
        self.record(path)?;
        self.staged_layers.push(layer.clone());
        Ok(())
    }

    fn relocate_texture(&mut self, request: &TextureCopyRequest) -> Result<(), BackendCause> {
        self.record(&request.destination)
    }

    fn commit(&mut self) -> Result<(), BackendCause> {
        self.committed.append(&mut self.pending);
        self.layers.append(&mut self.staged_layers);
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending.clear();
        self.staged_layers.clear();
        self.rollbacks += 1;
    }
}
