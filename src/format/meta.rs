//! Meta header decode/encode and validation.
//!
//! The meta body sits immediately after the page header on a meta page.
//! Its checksum is an FNV-1a 64 hash of the serialized bytes of every
//! preceding field in declared order, which keeps it independent of the
//! in-memory representation.
#![forbid(unsafe_code)]

use core::ops::Range;
use std::hash::Hasher;

use fnv::FnvHasher;

use super::{PageId, MAGIC, PAGE_HDR_LEN, VERSION};
use crate::error::{Result, SalvageError};

const META_MAGIC: Range<usize> = PAGE_HDR_LEN..PAGE_HDR_LEN + 4;
const META_VERSION: Range<usize> = PAGE_HDR_LEN + 4..PAGE_HDR_LEN + 8;
const META_PAGE_SIZE: Range<usize> = PAGE_HDR_LEN + 8..PAGE_HDR_LEN + 12;
const META_FLAGS: Range<usize> = PAGE_HDR_LEN + 12..PAGE_HDR_LEN + 16;
const META_ROOT: Range<usize> = PAGE_HDR_LEN + 16..PAGE_HDR_LEN + 24;
const META_ROOT_SEQUENCE: Range<usize> = PAGE_HDR_LEN + 24..PAGE_HDR_LEN + 32;
const META_FREELIST: Range<usize> = PAGE_HDR_LEN + 32..PAGE_HDR_LEN + 40;
const META_PGID: Range<usize> = PAGE_HDR_LEN + 40..PAGE_HDR_LEN + 48;
const META_TXID: Range<usize> = PAGE_HDR_LEN + 48..PAGE_HDR_LEN + 56;
const META_CHECKSUM: Range<usize> = PAGE_HDR_LEN + 56..PAGE_HDR_LEN + 64;

/// Page offset one past the serialized meta body.
pub const META_END: usize = PAGE_HDR_LEN + 64;

/// Number of meta bytes covered by the checksum.
const CHECKSUM_INPUT_LEN: usize = 56;

/// Root bucket descriptor embedded in the meta header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InBucket {
    /// Page id of the bucket's root page.
    pub root: PageId,
    /// Monotonically increasing sequence counter.
    pub sequence: u64,
}

/// Decoded meta header of one of the two meta slots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Meta {
    /// Marker value, expected to equal [`MAGIC`].
    pub magic: u32,
    /// Data file format version, expected to equal [`VERSION`].
    pub version: u32,
    /// Page size the file was written with.
    pub page_size: u32,
    /// Flag bits; unused by this crate.
    pub flags: u32,
    /// Root bucket descriptor.
    pub root: InBucket,
    /// Page id of the freelist page.
    pub freelist: PageId,
    /// Total page count at the last commit.
    pub pgid: PageId,
    /// Transaction id of the last commit.
    pub txid: u64,
    /// Stored checksum over all preceding fields.
    pub checksum: u64,
}

impl Meta {
    /// Decodes the meta body from a page buffer starting at its header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < META_END {
            return Err(SalvageError::OutOfBounds("meta header truncated"));
        }
        Ok(Self {
            magic: u32::from_le_bytes(buf[META_MAGIC].try_into().unwrap()),
            version: u32::from_le_bytes(buf[META_VERSION].try_into().unwrap()),
            page_size: u32::from_le_bytes(buf[META_PAGE_SIZE].try_into().unwrap()),
            flags: u32::from_le_bytes(buf[META_FLAGS].try_into().unwrap()),
            root: InBucket {
                root: PageId(u64::from_le_bytes(buf[META_ROOT].try_into().unwrap())),
                sequence: u64::from_le_bytes(buf[META_ROOT_SEQUENCE].try_into().unwrap()),
            },
            freelist: PageId(u64::from_le_bytes(buf[META_FREELIST].try_into().unwrap())),
            pgid: PageId(u64::from_le_bytes(buf[META_PGID].try_into().unwrap())),
            txid: u64::from_le_bytes(buf[META_TXID].try_into().unwrap()),
            checksum: u64::from_le_bytes(buf[META_CHECKSUM].try_into().unwrap()),
        })
    }

    /// Serializes the meta body into a page buffer, storing a freshly
    /// computed checksum over the preceding fields.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < META_END {
            return Err(SalvageError::OutOfBounds("meta buffer too small"));
        }
        buf[META_MAGIC].copy_from_slice(&self.magic.to_le_bytes());
        buf[META_VERSION].copy_from_slice(&self.version.to_le_bytes());
        buf[META_PAGE_SIZE].copy_from_slice(&self.page_size.to_le_bytes());
        buf[META_FLAGS].copy_from_slice(&self.flags.to_le_bytes());
        buf[META_ROOT].copy_from_slice(&self.root.root.0.to_le_bytes());
        buf[META_ROOT_SEQUENCE].copy_from_slice(&self.root.sequence.to_le_bytes());
        buf[META_FREELIST].copy_from_slice(&self.freelist.0.to_le_bytes());
        buf[META_PGID].copy_from_slice(&self.pgid.0.to_le_bytes());
        buf[META_TXID].copy_from_slice(&self.txid.to_le_bytes());
        buf[META_CHECKSUM].copy_from_slice(&self.sum64().to_le_bytes());
        Ok(())
    }

    /// Checks magic, version, and checksum, in that order.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(SalvageError::InvalidFormat);
        }
        if self.version != VERSION {
            return Err(SalvageError::VersionMismatch);
        }
        if self.checksum != self.sum64() {
            return Err(SalvageError::ChecksumMismatch);
        }
        Ok(())
    }

    /// FNV-1a 64 hash over the serialized bytes of every field preceding
    /// the checksum, in declared order.
    pub fn sum64(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        hasher.write(&self.checksum_input());
        hasher.finish()
    }

    fn checksum_input(&self) -> [u8; CHECKSUM_INPUT_LEN] {
        let mut out = [0u8; CHECKSUM_INPUT_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.page_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..24].copy_from_slice(&self.root.root.0.to_le_bytes());
        out[24..32].copy_from_slice(&self.root.sequence.to_le_bytes());
        out[32..40].copy_from_slice(&self.freelist.0.to_le_bytes());
        out[40..48].copy_from_slice(&self.pgid.0.to_le_bytes());
        out[48..56].copy_from_slice(&self.txid.to_le_bytes());
        out
    }
}
