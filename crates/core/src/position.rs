//! Journal positions

use crate::wire::WireError;
use serde::{Deserialize, Serialize};

/// Length of an encoded position token in bytes
pub const TOKEN_LEN: usize = 16;

/// A point in one mount's change history
///
/// Ordered by `(generation, sequence)`. A position is only meaningful to a
/// journal whose current generation equals `generation`; comparing positions
/// across generations says nothing about which changes they cover.
///
/// Positions are opaque to consumers: there is no arithmetic on them, only
/// the journal hands out new ones.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Position {
    generation: u64,
    sequence: u64,
}

impl Position {
    /// Create a position from its raw parts
    pub const fn new(generation: u64, sequence: u64) -> Self {
        Self {
            generation,
            sequence,
        }
    }

    /// The position of an empty journal in the given generation
    pub const fn initial(generation: u64) -> Self {
        Self::new(generation, 0)
    }

    /// Mount generation this position belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Sequence number within the generation
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The position directly after this one in the same generation
    ///
    /// Returns `None` when the sequence space is exhausted.
    pub fn checked_next(&self) -> Option<Self> {
        self.sequence
            .checked_add(1)
            .map(|sequence| Self::new(self.generation, sequence))
    }

    /// Whether both positions belong to the same mount generation
    pub fn same_generation(&self, other: &Position) -> bool {
        self.generation == other.generation
    }

    /// Encode as an opaque fixed-size token
    ///
    /// Layout: generation (big-endian u64) followed by sequence (big-endian u64),
    /// so byte-wise comparison of tokens matches position ordering.
    pub fn to_token(&self) -> [u8; TOKEN_LEN] {
        let mut token = [0u8; TOKEN_LEN];
        token[..8].copy_from_slice(&self.generation.to_be_bytes());
        token[8..].copy_from_slice(&self.sequence.to_be_bytes());
        token
    }

    /// Decode a token produced by [`Position::to_token`]
    pub fn from_token(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != TOKEN_LEN {
            return Err(WireError::MalformedPosition(format!(
                "expected {} bytes, got {}",
                TOKEN_LEN,
                bytes.len()
            )));
        }

        let mut generation = [0u8; 8];
        let mut sequence = [0u8; 8];
        generation.copy_from_slice(&bytes[..8]);
        sequence.copy_from_slice(&bytes[8..]);

        Ok(Self::new(
            u64::from_be_bytes(generation),
            u64::from_be_bytes(sequence),
        ))
    }

    /// Hex rendering of the token
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_token())
    }

    /// Parse a hex token
    pub fn from_hex(s: &str) -> Result<Self, WireError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| WireError::MalformedPosition(format!("invalid hex: {}", e)))?;
        Self::from_token(&bytes)
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Position({}:{})", self.generation, self.sequence)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.generation, self.sequence)
    }
}
