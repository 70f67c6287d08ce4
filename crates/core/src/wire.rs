//! Wire encoding for query results
//!
//! Change lists are encoded with bincode (fixed-width little-endian integers).
//! Enumerations travel as their stable small integers and paths as raw byte
//! buffers, so a decoded result is bit-for-bit the one that was encoded.

use crate::change::ChangeRecord;
use crate::position::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding wire data
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed position token: {0}")]
    MalformedPosition(String),

    #[error("unknown {kind} value {value}")]
    UnknownEnumValue { kind: &'static str, value: u8 },

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Answer to a changes-since query
///
/// `to_position` is the journal position the answer was computed against;
/// passing it to the next query continues exactly where this one ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesSinceResult {
    pub to_position: Position,
    pub changes: Vec<ChangeRecord>,
}

impl ChangesSinceResult {
    /// Serialize to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, WireError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Encode a bare change list
pub fn encode_changes(changes: &[ChangeRecord]) -> Result<Vec<u8>, WireError> {
    Ok(bincode::serialize(changes)?)
}

/// Decode a change list produced by [`encode_changes`]
pub fn decode_changes(bytes: &[u8]) -> Result<Vec<ChangeRecord>, WireError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Dtype, LostChangesReason};
    use crate::path::RawPath;

    #[test]
    fn test_enum_tags_are_stable() {
        // Layout: outer tag (u32), small-change tag (u32), dtype (u8), path...
        let bytes = encode_changes(&[ChangeRecord::replaced(Dtype::Regular, "a", "b")]).unwrap();
        // 8 bytes vec length, then record
        assert_eq!(&bytes[8..12], &0u32.to_le_bytes()); // Small
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes()); // Replaced
        assert_eq!(bytes[16], 8); // REGULAR

        let bytes = encode_changes(&[ChangeRecord::lost(LostChangesReason::Truncated)]).unwrap();
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes()); // Large
        assert_eq!(&bytes[12..16], &0u32.to_le_bytes()); // LostChanges
        assert_eq!(bytes[16], 2); // Truncated
    }

    #[test]
    fn test_raw_path_bytes_survive() {
        let path = RawPath::from_bytes(&[0x80, b'/', 0xff]);
        let changes = vec![ChangeRecord::Small(crate::SmallChange::Removed {
            file_type: Dtype::Symlink,
            path: path.clone(),
        })];
        let decoded = decode_changes(&encode_changes(&changes).unwrap()).unwrap();
        assert_eq!(decoded, changes);
        assert_eq!(decoded[0].as_small().unwrap().path(), &path);
    }

    #[test]
    fn test_unknown_dtype_rejected() {
        let mut bytes = encode_changes(&[ChangeRecord::added(Dtype::Regular, "x")]).unwrap();
        bytes[16] = 99;
        assert!(decode_changes(&bytes).is_err());
    }

    #[test]
    fn test_result_carries_position() {
        let result = ChangesSinceResult {
            to_position: Position::new(2, 9),
            changes: vec![ChangeRecord::modified(Dtype::Regular, "test_file")],
        };
        let decoded = ChangesSinceResult::deserialize(&result.serialize().unwrap()).unwrap();
        assert_eq!(decoded, result);
    }
}
