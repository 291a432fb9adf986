//! Host application pre-flight

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

/// Host application version as `(major, minor, patch)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostVersion(pub u32, pub u32, pub u32);

impl HostVersion {
    /// Oldest host release the exporter runs against
    pub const MINIMUM_SUPPORTED: Self = Self(9, 0, 0);

    /// Whether this version meets [`Self::MINIMUM_SUPPORTED`]
    pub fn is_supported(self) -> bool {
        self >= Self::MINIMUM_SUPPORTED
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Reject unsupported hosts before any export work begins
///
/// A host that does not report a version is not checked.
pub fn preflight(version: Option<HostVersion>) -> ExportResult<()> {
    match version {
        Some(found) if !found.is_supported() => {
            log::error!("Host version {found} is older than {}", HostVersion::MINIMUM_SUPPORTED);
            Err(ExportError::UnsupportedHostVersion {
                found,
                minimum: HostVersion::MINIMUM_SUPPORTED,
            })
        }
        _ => Ok(()),
    }
}
