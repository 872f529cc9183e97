//! Page size detection for files whose metadata cannot be trusted.
//!
//! The page size normally lives in the meta header, but that is exactly
//! what may be damaged. Detection probes the first meta slot at offset 0,
//! then brute-forces the second slot at every candidate size from 1 KiB to
//! 16 MiB, and finally falls back to the platform page size when at least
//! one slot region was readable at the byte level.

use std::fs::File;

use tracing::debug;

use crate::error::{Result, SalvageError};
use crate::format::meta::Meta;
use crate::io;

/// Probe block length; enough to hold a page header plus a meta body.
pub const PROBE_LEN: usize = 1024;

/// Largest candidate exponent: `1024 << 14` is 16 MiB.
const MAX_CANDIDATE_SHIFT: u32 = 14;

/// Derives the page size of a damaged file without relying on any
/// already-known page size.
pub fn detect_page_size(file: &File) -> Result<u32> {
    // The common case: page 0 is intact and declares the size itself.
    let (size, slot0_readable) = page_size_from_first_meta(file);
    if let Some(size) = size {
        debug!(size, "page size taken from first meta slot");
        return Ok(size);
    }

    let file_size = file.metadata()?.len();
    let (size, slot1_readable) = page_size_from_second_meta(file, file_size);
    if let Some(size) = size {
        debug!(size, "page size taken from second meta slot");
        return Ok(size);
    }

    // A store's page size is usually chosen to match the OS page size at
    // creation time, so that is the best uninformed guess as long as the
    // file itself was readable.
    if slot0_readable || slot1_readable {
        let size = default_page_size();
        debug!(size, "neither meta slot validates, assuming platform page size");
        return Ok(size);
    }

    Err(SalvageError::InvalidDatabase)
}

/// Page size the current platform allocates memory in.
pub fn default_page_size() -> u32 {
    sys::page_size()
}

fn read_probe(file: &File, offset: u64) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; PROBE_LEN];
    match io::read_exact(file, offset, &mut buf) {
        Ok(()) => Some(buf),
        Err(_) => None,
    }
}

fn valid_meta_page_size(buf: &[u8]) -> Option<u32> {
    let meta = Meta::decode(buf).ok()?;
    meta.validate().ok()?;
    // The checksum only proves the meta is self-consistent; a declared
    // size of 0 is still garbage and would stall the scan cursor.
    if meta.page_size == 0 {
        return None;
    }
    Some(meta.page_size)
}

fn page_size_from_first_meta(file: &File) -> (Option<u32>, bool) {
    match read_probe(file, 0) {
        Some(buf) => (valid_meta_page_size(&buf), true),
        None => (None, false),
    }
}

/// Tries every candidate page size for the second meta slot, smallest
/// first, stopping once the candidate offset lands within the final
/// [`PROBE_LEN`] bytes of the file.
fn page_size_from_second_meta(file: &File, file_size: u64) -> (Option<u32>, bool) {
    let mut readable = false;
    for shift in 0..=MAX_CANDIDATE_SHIFT {
        let pos = 1024u64 << shift;
        if pos >= file_size.saturating_sub(PROBE_LEN as u64) {
            break;
        }
        let Some(buf) = read_probe(file, pos) else {
            continue;
        };
        readable = true;
        if let Some(size) = valid_meta_page_size(&buf) {
            return (Some(size), readable);
        }
    }
    (None, readable)
}

#[cfg(unix)]
mod sys {
    #![allow(unsafe_code)]

    pub fn page_size() -> u32 {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            4096
        } else {
            size as u32
        }
    }
}

#[cfg(not(unix))]
mod sys {
    pub fn page_size() -> u32 {
        4096
    }
}
