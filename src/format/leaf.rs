//! Leaf and branch element layout.
//!
//! A leaf page carries an array of fixed-size element headers right after
//! the page header, followed by a contiguous region holding every key and
//! value back to back. Each element's `pos` is relative to the element
//! header's own offset.
#![forbid(unsafe_code)]

use core::ops::Range;

use super::{PageId, PAGE_HDR_LEN};
use crate::error::{Result, SalvageError};

/// Size of one leaf element header.
pub const LEAF_ELEM_LEN: usize = 16;
/// Size of one branch element header.
pub const BRANCH_ELEM_LEN: usize = 16;
/// Leaf element flag marking a value that is itself a bucket.
pub const BUCKET_LEAF_FLAG: u32 = 0x01;

/// Byte offsets within one leaf element header.
mod elem {
    use core::ops::Range;

    pub const FLAGS: Range<usize> = 0..4;
    pub const POS: Range<usize> = 4..8;
    pub const KSIZE: Range<usize> = 8..12;
    pub const VSIZE: Range<usize> = 12..16;
}

/// Byte offsets within one branch element header.
mod branch_elem {
    use core::ops::Range;

    pub const POS: Range<usize> = 0..4;
    pub const KSIZE: Range<usize> = 4..8;
    pub const PGID: Range<usize> = 8..16;
}

fn elem_offset(index: u16) -> usize {
    PAGE_HDR_LEN + index as usize * LEAF_ELEM_LEN
}

fn elem_range(index: u16) -> Range<usize> {
    let start = elem_offset(index);
    start..start + LEAF_ELEM_LEN
}

/// One entry of a leaf page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeafElement {
    /// Flag bits; see [`BUCKET_LEAF_FLAG`].
    pub flags: u32,
    /// Offset of the key bytes, relative to this element header.
    pub pos: u32,
    /// Key length in bytes.
    pub ksize: u32,
    /// Value length in bytes.
    pub vsize: u32,
}

impl LeafElement {
    /// Decodes the element header at `index` from a leaf page buffer.
    pub fn decode(page: &[u8], index: u16) -> Result<Self> {
        let range = elem_range(index);
        if range.end > page.len() {
            return Err(SalvageError::OutOfBounds("leaf element outside page"));
        }
        let hdr = &page[range];
        Ok(Self {
            flags: u32::from_le_bytes(hdr[elem::FLAGS].try_into().unwrap()),
            pos: u32::from_le_bytes(hdr[elem::POS].try_into().unwrap()),
            ksize: u32::from_le_bytes(hdr[elem::KSIZE].try_into().unwrap()),
            vsize: u32::from_le_bytes(hdr[elem::VSIZE].try_into().unwrap()),
        })
    }

    /// Serializes the element header at `index` into a leaf page buffer.
    pub fn encode(&self, page: &mut [u8], index: u16) -> Result<()> {
        let range = elem_range(index);
        if range.end > page.len() {
            return Err(SalvageError::OutOfBounds("leaf element outside page"));
        }
        let hdr = &mut page[range];
        hdr[elem::FLAGS].copy_from_slice(&self.flags.to_le_bytes());
        hdr[elem::POS].copy_from_slice(&self.pos.to_le_bytes());
        hdr[elem::KSIZE].copy_from_slice(&self.ksize.to_le_bytes());
        hdr[elem::VSIZE].copy_from_slice(&self.vsize.to_le_bytes());
        Ok(())
    }

    /// True when the element's value is an embedded bucket.
    pub fn is_bucket(&self) -> bool {
        self.flags & BUCKET_LEAF_FLAG != 0
    }

    /// Borrows the key bytes of the element at `index` from the page.
    pub fn key<'a>(&self, page: &'a [u8], index: u16) -> Result<&'a [u8]> {
        let start = elem_offset(index) + self.pos as usize;
        let end = start + self.ksize as usize;
        if end > page.len() {
            return Err(SalvageError::OutOfBounds("leaf key outside page"));
        }
        Ok(&page[start..end])
    }

    /// Borrows the value bytes of the element at `index` from the page.
    pub fn value<'a>(&self, page: &'a [u8], index: u16) -> Result<&'a [u8]> {
        let start = elem_offset(index) + self.pos as usize + self.ksize as usize;
        let end = start + self.vsize as usize;
        if end > page.len() {
            return Err(SalvageError::OutOfBounds("leaf value outside page"));
        }
        Ok(&page[start..end])
    }
}

/// One entry of a branch page; written only when building a fresh store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BranchElement {
    /// Offset of the key bytes, relative to this element header.
    pub pos: u32,
    /// Key length in bytes.
    pub ksize: u32,
    /// Page id of the child page.
    pub pgid: PageId,
}

impl BranchElement {
    /// Serializes the element header at `index` into a branch page buffer.
    pub fn encode(&self, page: &mut [u8], index: u16) -> Result<()> {
        let start = PAGE_HDR_LEN + index as usize * BRANCH_ELEM_LEN;
        let end = start + BRANCH_ELEM_LEN;
        if end > page.len() {
            return Err(SalvageError::OutOfBounds("branch element outside page"));
        }
        let hdr = &mut page[start..end];
        hdr[branch_elem::POS].copy_from_slice(&self.pos.to_le_bytes());
        hdr[branch_elem::KSIZE].copy_from_slice(&self.ksize.to_le_bytes());
        hdr[branch_elem::PGID].copy_from_slice(&self.pgid.0.to_le_bytes());
        Ok(())
    }
}
