//! On-disk layout of the bolt page format.
//!
//! Every structure here is decoded from (or encoded into) a plain byte
//! buffer with explicit fixed-width little-endian accesses at documented
//! offsets. Decoding fails only when an access would fall outside the
//! buffer; all other consistency checks belong to the callers.
#![forbid(unsafe_code)]

use std::fmt;

use crate::error::{Result, SalvageError};

pub mod leaf;
pub mod meta;

/// Marker value identifying a bolt data file.
pub const MAGIC: u32 = 0xED0C_DAED;
/// Data file format version understood by this crate.
pub const VERSION: u32 = 2;
/// Length of the fixed header at the start of every page.
pub const PAGE_HDR_LEN: usize = 16;

/// Byte offsets of the fixed page header fields.
pub mod header {
    use core::ops::Range;

    /// Page id, equal to the page's file index.
    pub const ID: Range<usize> = 0..8;
    /// Page type flags.
    pub const FLAGS: Range<usize> = 8..10;
    /// Element count (leaf/branch) or entry count (freelist).
    pub const COUNT: Range<usize> = 10..12;
    /// Number of additional page-size blocks following this page.
    pub const OVERFLOW: Range<usize> = 12..16;
}

/// Identifier of a page, equal to its index within the file.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u64);

impl PageId {
    /// Byte offset of this page for the given page size.
    pub fn offset(self, page_size: u32) -> u64 {
        self.0.saturating_mul(u64::from(page_size))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four page kinds a well-formed file contains.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PageKind {
    /// Internal routing page of a B+tree.
    Branch = 0x01,
    /// Page holding key/value entries.
    Leaf = 0x02,
    /// One of the two meta slots.
    Meta = 0x04,
    /// Free-space bookkeeping page.
    Freelist = 0x10,
}

impl PageKind {
    /// Raw flag value stored in the page header.
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maps raw header flags to a kind, or `None` for anything unknown.
    pub fn from_flags(flags: u16) -> Option<PageKind> {
        match flags {
            0x01 => Some(PageKind::Branch),
            0x02 => Some(PageKind::Leaf),
            0x04 => Some(PageKind::Meta),
            0x10 => Some(PageKind::Freelist),
            _ => None,
        }
    }
}

/// Fixed header present at the start of every page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageHeader {
    /// Page id, stored redundantly for self-verification.
    pub id: PageId,
    /// Raw type flags; see [`PageKind`].
    pub flags: u16,
    /// Number of elements on the page.
    pub count: u16,
    /// Additional page-size blocks belonging to this page.
    pub overflow: u32,
}

impl PageHeader {
    /// Builds a header for a freshly written page.
    pub fn new(id: PageId, kind: PageKind, count: u16, overflow: u32) -> Self {
        Self {
            id,
            flags: kind.as_u16(),
            count,
            overflow,
        }
    }

    /// The page kind, or `None` when the flags match no known kind.
    pub fn kind(&self) -> Option<PageKind> {
        PageKind::from_flags(self.flags)
    }

    /// Serializes the header into the first [`PAGE_HDR_LEN`] bytes of `dst`.
    pub fn encode(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() < PAGE_HDR_LEN {
            return Err(SalvageError::OutOfBounds("page header buffer too small"));
        }
        let hdr = &mut dst[..PAGE_HDR_LEN];
        hdr[header::ID].copy_from_slice(&self.id.0.to_le_bytes());
        hdr[header::FLAGS].copy_from_slice(&self.flags.to_le_bytes());
        hdr[header::COUNT].copy_from_slice(&self.count.to_le_bytes());
        hdr[header::OVERFLOW].copy_from_slice(&self.overflow.to_le_bytes());
        Ok(())
    }

    /// Decodes the header from the first [`PAGE_HDR_LEN`] bytes of `src`.
    ///
    /// Unknown type flags are not an error here; callers decide how to
    /// treat them via [`PageHeader::kind`].
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < PAGE_HDR_LEN {
            return Err(SalvageError::OutOfBounds("page header truncated"));
        }
        let hdr = &src[..PAGE_HDR_LEN];
        let id = PageId(u64::from_le_bytes(hdr[header::ID].try_into().unwrap()));
        let flags = u16::from_le_bytes(hdr[header::FLAGS].try_into().unwrap());
        let count = u16::from_le_bytes(hdr[header::COUNT].try_into().unwrap());
        let overflow = u32::from_le_bytes(hdr[header::OVERFLOW].try_into().unwrap());
        Ok(Self {
            id,
            flags,
            count,
            overflow,
        })
    }
}
