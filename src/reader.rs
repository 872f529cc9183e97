//! Single-page reads with self-consistency checks.

use std::fs::File;
use std::io::ErrorKind;

use crate::error::{Result, SalvageError};
use crate::format::{PageHeader, PageId};
use crate::io;

/// Reads the page at `page_id`, verifying that the decoded header agrees
/// with the requested position.
///
/// A short read fails with `UnexpectedEof`. A decoded id that differs from
/// `page_id` fails with `IdMismatch`, which catches misaligned or garbage
/// reads that happen to parse. When the header declares overflow blocks,
/// the full `(1 + overflow) * page_size` span is re-read from the same
/// offset after checking that it stays within `file_size`.
pub fn read_page(
    file: &File,
    page_size: u32,
    page_id: PageId,
    file_size: u64,
) -> Result<(PageHeader, Vec<u8>)> {
    let offset = page_id.offset(page_size);
    let mut buf = vec![0u8; page_size as usize];
    io::read_exact(file, offset, &mut buf).map_err(|err| eof_as_variant(err, page_id))?;

    let header = PageHeader::decode(&buf)?;
    if header.id != page_id {
        return Err(SalvageError::IdMismatch {
            got: header.id.0,
            want: page_id.0,
        });
    }
    if header.overflow == 0 {
        return Ok((header, buf));
    }

    let span = (u64::from(header.overflow) + 1).saturating_mul(u64::from(page_size));
    if offset.saturating_add(span) > file_size {
        return Err(SalvageError::OverflowExceedsFile {
            page_id: page_id.0,
            overflow: header.overflow,
            file_size,
        });
    }
    let mut buf = vec![0u8; span as usize];
    io::read_exact(file, offset, &mut buf).map_err(|err| eof_as_variant(err, page_id))?;
    let header = PageHeader::decode(&buf)?;
    Ok((header, buf))
}

fn eof_as_variant(err: std::io::Error, page_id: PageId) -> SalvageError {
    if err.kind() == ErrorKind::UnexpectedEof {
        SalvageError::UnexpectedEof { page_id: page_id.0 }
    } else {
        SalvageError::Io(err)
    }
}
