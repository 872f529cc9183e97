//! Key classification for salvageable records.
//!
//! Leaf pages of a damaged file contain real data keys mixed with internal
//! bookkeeping entries and plain garbage. The classifier is the external
//! key-shape contract that separates the two; it is injectable because the
//! shape belongs to one specific key-encoding scheme and may evolve
//! independently of the scan algorithm.
#![forbid(unsafe_code)]

/// Byte separating the main and sub counters of an encoded revision key.
pub const REVISION_SEPARATOR: u8 = b'_';
/// Trailing marker on the 18-byte deletion variant of a revision key.
pub const TOMBSTONE_MARKER: u8 = b't';

/// Predicate deciding whether a leaf key belongs to a salvageable record.
pub trait KeyFilter {
    /// Returns true when the key matches the expected shape.
    fn accept(&self, key: &[u8]) -> bool;
}

/// Default filter matching revision keys: 17 bytes with the separator at
/// index 8, or 18 bytes with the separator at index 8 and the tombstone
/// marker at index 17.
#[derive(Clone, Copy, Debug)]
pub struct RevisionKeyFilter {
    /// Expected byte at index 8.
    pub separator: u8,
    /// Expected byte at index 17 of the 18-byte variant.
    pub tombstone: u8,
}

impl Default for RevisionKeyFilter {
    fn default() -> Self {
        Self {
            separator: REVISION_SEPARATOR,
            tombstone: TOMBSTONE_MARKER,
        }
    }
}

impl KeyFilter for RevisionKeyFilter {
    fn accept(&self, key: &[u8]) -> bool {
        if key.len() != 17 && key.len() != 18 {
            return false;
        }
        if key[8] != self.separator {
            return false;
        }
        if key.len() == 18 && key[17] != self.tombstone {
            return false;
        }
        true
    }
}
