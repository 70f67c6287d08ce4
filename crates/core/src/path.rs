//! Raw byte paths
//!
//! Paths reported by the filesystem driver are byte strings relative to the
//! mount root. They are not guaranteed to be valid UTF-8 and are never
//! normalized or re-encoded on their way through the journal.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

/// A mount-relative path as raw bytes
///
/// Uses SmallVec so typical short paths (< 64 bytes) stay inline.
#[derive(Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RawPath(SmallVec<[u8; 64]>);

impl RawPath {
    /// Create a path from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    /// Raw bytes of the path
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the mount root
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 rendering for logs and human output
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Heap bytes held beyond the inline buffer
    pub fn spilled_bytes(&self) -> usize {
        if self.0.spilled() {
            self.0.capacity()
        } else {
            0
        }
    }
}

impl From<&str> for RawPath {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<&[u8]> for RawPath {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for RawPath {
    fn from(bytes: Vec<u8>) -> Self {
        Self(SmallVec::from_vec(bytes))
    }
}

impl From<&Path> for RawPath {
    #[cfg(unix)]
    fn from(path: &Path) -> Self {
        use std::os::unix::ffi::OsStrExt;
        Self::from_bytes(path.as_os_str().as_bytes())
    }

    #[cfg(not(unix))]
    fn from(path: &Path) -> Self {
        Self::from_bytes(path.to_string_lossy().as_bytes())
    }
}

impl std::fmt::Debug for RawPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawPath(\"{}\")", self.0.escape_ascii())
    }
}

impl std::fmt::Display for RawPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}
