//! Change records stored in the journal
//!
//! A change is either small (one file-local mutation) or large (a structural
//! event such as lost history). Consumers match on both levels exhaustively.

use crate::path::RawPath;
use crate::wire::WireError;
use serde::{Deserialize, Serialize};

/// Kind of filesystem entry a change refers to
///
/// Wire values follow `d_type` so they stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Dtype {
    /// Anything that is not a file, directory or symlink
    Other = 0,
    /// Directory
    Directory = 4,
    /// Regular file
    Regular = 8,
    /// Symbolic link
    Symlink = 10,
}

impl From<Dtype> for u8 {
    fn from(dtype: Dtype) -> u8 {
        dtype as u8
    }
}

impl TryFrom<u8> for Dtype {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Dtype::Other),
            4 => Ok(Dtype::Directory),
            8 => Ok(Dtype::Regular),
            10 => Ok(Dtype::Symlink),
            other => Err(WireError::UnknownEnumValue {
                kind: "Dtype",
                value: other,
            }),
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dtype::Other => "OTHER",
            Dtype::Directory => "DIR",
            Dtype::Regular => "REGULAR",
            Dtype::Symlink => "LINK",
        };
        f.write_str(name)
    }
}

/// Why a range of history cannot be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LostChangesReason {
    /// Cause not known
    Unknown = 0,
    /// The mount was remounted since the requested position
    Remounted = 1,
    /// Entries after the requested position were pruned
    Truncated = 2,
    /// The range holds more changes than the caller may receive
    TooManyChanges = 3,
}

impl From<LostChangesReason> for u8 {
    fn from(reason: LostChangesReason) -> u8 {
        reason as u8
    }
}

impl TryFrom<u8> for LostChangesReason {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LostChangesReason::Unknown),
            1 => Ok(LostChangesReason::Remounted),
            2 => Ok(LostChangesReason::Truncated),
            3 => Ok(LostChangesReason::TooManyChanges),
            other => Err(WireError::UnknownEnumValue {
                kind: "LostChangesReason",
                value: other,
            }),
        }
    }
}

/// A file-local mutation
///
/// Variant order is the wire tag; append new variants at the end only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmallChange {
    /// Entry was created
    Added { file_type: Dtype, path: RawPath },
    /// Entry content or metadata was written
    Modified { file_type: Dtype, path: RawPath },
    /// Entry moved to a destination that did not exist
    Renamed {
        file_type: Dtype,
        from: RawPath,
        to: RawPath,
    },
    /// Entry moved onto an existing destination, clobbering it
    Replaced {
        file_type: Dtype,
        from: RawPath,
        to: RawPath,
    },
    /// Entry was removed
    Removed { file_type: Dtype, path: RawPath },
}

impl SmallChange {
    /// File kind of the changed entry
    pub fn file_type(&self) -> Dtype {
        match self {
            SmallChange::Added { file_type, .. }
            | SmallChange::Modified { file_type, .. }
            | SmallChange::Renamed { file_type, .. }
            | SmallChange::Replaced { file_type, .. }
            | SmallChange::Removed { file_type, .. } => *file_type,
        }
    }

    /// Primary path: the path itself, or the source of a move
    pub fn path(&self) -> &RawPath {
        match self {
            SmallChange::Added { path, .. }
            | SmallChange::Modified { path, .. }
            | SmallChange::Removed { path, .. } => path,
            SmallChange::Renamed { from, .. } | SmallChange::Replaced { from, .. } => from,
        }
    }

    /// Check if this change touches the given path (either side of a move)
    pub fn affects_path(&self, path: &RawPath) -> bool {
        match self {
            SmallChange::Renamed { from, to, .. } | SmallChange::Replaced { from, to, .. } => {
                from == path || to == path
            }
            _ => self.path() == path,
        }
    }

    fn heap_bytes(&self) -> usize {
        match self {
            SmallChange::Added { path, .. }
            | SmallChange::Modified { path, .. }
            | SmallChange::Removed { path, .. } => path.spilled_bytes(),
            SmallChange::Renamed { from, to, .. } | SmallChange::Replaced { from, to, .. } => {
                from.spilled_bytes() + to.spilled_bytes()
            }
        }
    }
}

/// A structural event that affects more than one file
///
/// Variant order is the wire tag; append new variants at the end only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LargeChange {
    /// The requested history cannot be reconstructed
    LostChanges { reason: LostChangesReason },
    /// A whole directory moved; everything beneath it changed path
    DirectoryRenamed { from: RawPath, to: RawPath },
    /// The working copy moved between two commits
    CommitTransition { from: Vec<u8>, to: Vec<u8> },
}

impl LargeChange {
    fn heap_bytes(&self) -> usize {
        match self {
            LargeChange::LostChanges { .. } => 0,
            LargeChange::DirectoryRenamed { from, to } => from.spilled_bytes() + to.spilled_bytes(),
            LargeChange::CommitTransition { from, to } => from.capacity() + to.capacity(),
        }
    }
}

/// One journal record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeRecord {
    Small(SmallChange),
    Large(LargeChange),
}

impl ChangeRecord {
    pub fn added(file_type: Dtype, path: impl Into<RawPath>) -> Self {
        ChangeRecord::Small(SmallChange::Added {
            file_type,
            path: path.into(),
        })
    }

    pub fn modified(file_type: Dtype, path: impl Into<RawPath>) -> Self {
        ChangeRecord::Small(SmallChange::Modified {
            file_type,
            path: path.into(),
        })
    }

    pub fn removed(file_type: Dtype, path: impl Into<RawPath>) -> Self {
        ChangeRecord::Small(SmallChange::Removed {
            file_type,
            path: path.into(),
        })
    }

    pub fn renamed(file_type: Dtype, from: impl Into<RawPath>, to: impl Into<RawPath>) -> Self {
        ChangeRecord::Small(SmallChange::Renamed {
            file_type,
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn replaced(file_type: Dtype, from: impl Into<RawPath>, to: impl Into<RawPath>) -> Self {
        ChangeRecord::Small(SmallChange::Replaced {
            file_type,
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn lost(reason: LostChangesReason) -> Self {
        ChangeRecord::Large(LargeChange::LostChanges { reason })
    }

    pub fn directory_renamed(from: impl Into<RawPath>, to: impl Into<RawPath>) -> Self {
        ChangeRecord::Large(LargeChange::DirectoryRenamed {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn commit_transition(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Self {
        ChangeRecord::Large(LargeChange::CommitTransition {
            from: from.into(),
            to: to.into(),
        })
    }

    /// Small change payload, if any
    pub fn as_small(&self) -> Option<&SmallChange> {
        match self {
            ChangeRecord::Small(change) => Some(change),
            ChangeRecord::Large(_) => None,
        }
    }

    /// Large change payload, if any
    pub fn as_large(&self) -> Option<&LargeChange> {
        match self {
            ChangeRecord::Small(_) => None,
            ChangeRecord::Large(change) => Some(change),
        }
    }

    /// Reason carried by a `LostChanges` record
    pub fn lost_reason(&self) -> Option<LostChangesReason> {
        match self {
            ChangeRecord::Large(LargeChange::LostChanges { reason }) => Some(*reason),
            _ => None,
        }
    }

    /// Approximate memory held by this record, used for retention budgets
    pub fn estimated_size(&self) -> usize {
        let heap = match self {
            ChangeRecord::Small(change) => change.heap_bytes(),
            ChangeRecord::Large(change) => change.heap_bytes(),
        };
        std::mem::size_of::<Self>() + heap
    }
}

impl std::fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeRecord::Small(SmallChange::Added { file_type, path }) => {
                write!(f, "added {} {}", file_type, path)
            }
            ChangeRecord::Small(SmallChange::Modified { file_type, path }) => {
                write!(f, "modified {} {}", file_type, path)
            }
            ChangeRecord::Small(SmallChange::Removed { file_type, path }) => {
                write!(f, "removed {} {}", file_type, path)
            }
            ChangeRecord::Small(SmallChange::Renamed { file_type, from, to }) => {
                write!(f, "renamed {} {} -> {}", file_type, from, to)
            }
            ChangeRecord::Small(SmallChange::Replaced { file_type, from, to }) => {
                write!(f, "replaced {} {} -> {}", file_type, from, to)
            }
            ChangeRecord::Large(LargeChange::LostChanges { reason }) => {
                write!(f, "lost changes ({:?})", reason)
            }
            ChangeRecord::Large(LargeChange::DirectoryRenamed { from, to }) => {
                write!(f, "directory renamed {} -> {}", from, to)
            }
            ChangeRecord::Large(LargeChange::CommitTransition { from, to }) => {
                write!(f, "commit {} -> {}", hex::encode(from), hex::encode(to))
            }
        }
    }
}
