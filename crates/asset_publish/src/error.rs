//! Export error taxonomy
//!
//! Per-file and per-material problems never show up here: they are recovered
//! locally and reported as [`SkipRecord`](crate::assets::SkipRecord)s. Every
//! variant of [`ExportError`] aborts the current export invocation.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::host::HostVersion;
use crate::publish::ExportStage;
use crate::shading::GraphError;

/// Boxed cause carried across the serialization boundary
pub type BackendCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal export errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Two distinct source textures want the same destination and the
    /// configured policy refuses to disambiguate
    #[error("Texture relocation collision at {destination:?}: {first:?} and {second:?}")]
    PathCollision {
        /// Contested destination
        destination: PathBuf,
        /// Source that claimed the destination first
        first: PathBuf,
        /// Source that was refused
        second: PathBuf,
    },

    /// A sampling node reads a texture the relocation map never saw
    #[error("Texture {texture:?} has no relocation destination")]
    UnresolvedTexture {
        /// Exported file
        texture: PathBuf,
    },

    /// A layering step was requested out of order
    #[error("Export is at stage {found:?}, expected {expected:?}")]
    StageOrder {
        /// Stage the step requires
        expected: ExportStage,
        /// Stage the export is actually at
        found: ExportStage,
    },

    /// A builder emitted a cyclic shader network
    #[error("Shader graph {graph} contains a cycle through node {node}")]
    GraphCycle {
        /// Graph prim path
        graph: String,
        /// A node that lies on the cycle
        node: String,
    },

    /// A builder emitted a structurally broken shader network
    #[error("Invalid shader graph {graph}: {reason}")]
    InvalidGraph {
        /// Graph prim path
        graph: String,
        /// What is wrong with it
        reason: String,
    },

    /// The external writer failed while persisting the plan
    #[error("Serialization backend failed: {context}")]
    SerializationBackend {
        /// Which write failed
        context: String,
        /// Underlying cause
        #[source]
        source: BackendCause,
    },

    /// Pre-flight rejected the host application
    #[error("Host version {found} is not supported (minimum {minimum})")]
    UnsupportedHostVersion {
        /// Version reported by the host
        found: HostVersion,
        /// Oldest supported version
        minimum: HostVersion,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Every material was dropped, there is nothing to publish
    #[error("No publishable materials in {0} exported texture(s)")]
    NoMaterials(usize),
}

impl ExportError {
    /// Wrap a serialization backend failure
    pub fn backend(context: impl Into<String>, source: impl Into<BackendCause>) -> Self {
        Self::SerializationBackend {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Convert a graph validation failure for the graph at `graph_path`
    pub fn from_graph(graph_path: &str, error: GraphError) -> Self {
        match error {
            GraphError::Cycle(node) => Self::GraphCycle {
                graph: graph_path.to_string(),
                node,
            },
            other => Self::InvalidGraph {
                graph: graph_path.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result alias used across the export pipeline
pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_graph_cycle_conversion() {
        let err = ExportError::from_graph("/Asset/mtl/Body/MtlxNodeGraph", GraphError::Cycle("a".into()));
        assert!(matches!(err, ExportError::GraphCycle { ref node, .. } if node == "a"));
    }

    #[test]
    fn test_dangling_connection_conversion() {
        let err = ExportError::from_graph(
            "/g",
            GraphError::DanglingConnection { from: "x".into(), to: "y".into() },
        );
        assert!(matches!(err, ExportError::InvalidGraph { .. }));
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ExportError::backend("writing mtl.usdc", io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("mtl.usdc"));
    }
}
