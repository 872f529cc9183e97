//! Fault-tolerant linear scan over every page of a damaged file.

use std::fs::File;

use tracing::{debug, warn};

use crate::classify::KeyFilter;
use crate::error::{Result, SalvageError};
use crate::format::{leaf::LeafElement, PageHeader, PageId, PageKind};
use crate::reader::read_page;

/// First page index holding data; indices 0 and 1 are the meta slots.
const FIRST_DATA_PAGE: u64 = 2;

/// Destination for salvaged records.
///
/// Implementations are expected to be idempotent under repeated keys
/// (last write wins). Any error returned from [`RecordSink::put`] aborts
/// the scan immediately.
pub trait RecordSink {
    /// Stores one key/value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Counters describing what a completed scan encountered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanReport {
    /// Pages the cursor attempted to read.
    pub pages_visited: u64,
    /// Pages whose read or decode failed.
    pub unreadable_pages: u64,
    /// Pages that decoded but carry unknown type flags.
    pub unknown_type_pages: u64,
    /// Leaf pages processed for records.
    pub leaf_pages: u64,
    /// Records accepted by the filter and forwarded to the sink.
    pub records: u64,
    /// Leaf elements skipped because they mark embedded buckets.
    pub bucket_entries_skipped: u64,
}

/// Walks every page of the file from index 2 (the first page after the
/// meta slots) upward,
/// forwarding classifier-accepted leaf records to `sink`.
///
/// One damaged page never aborts the scan: read and decode failures are
/// logged and the cursor advances by exactly one page (the minimal safe
/// step, since the true overflow count is unknown when the read itself
/// failed). Pages with unknown type flags advance by their own declared
/// overflow plus one. The cursor strictly increases every iteration, so
/// the scan performs at most `file_size / page_size` iterations.
///
/// A `page_size` of 0 is rejected up front: the loop bound degenerates
/// and the cursor would advance forever without covering the file.
pub fn scan<F: KeyFilter, S: RecordSink>(
    file: &File,
    page_size: u32,
    file_size: u64,
    filter: &F,
    sink: &mut S,
) -> Result<ScanReport> {
    if page_size == 0 {
        return Err(SalvageError::Invalid("page size must be nonzero"));
    }
    let mut report = ScanReport::default();
    let mut cursor = FIRST_DATA_PAGE;

    while cursor
        .saturating_add(1)
        .saturating_mul(u64::from(page_size))
        < file_size
    {
        report.pages_visited += 1;
        let (header, buf) = match read_page(file, page_size, PageId(cursor), file_size) {
            Ok(page) => page,
            Err(err) => {
                warn!(page_id = cursor, %err, "page read failed, skipping one page");
                report.unreadable_pages += 1;
                cursor += 1;
                continue;
            }
        };
        match header.kind() {
            None => {
                let err = SalvageError::UnknownPageType {
                    page_id: cursor,
                    flags: header.flags,
                };
                warn!(page_id = cursor, %err, "skipping page of unknown type");
                report.unknown_type_pages += 1;
            }
            Some(PageKind::Leaf) => {
                report.leaf_pages += 1;
                salvage_leaf(&header, &buf, filter, sink, &mut report)?;
            }
            // Data only ever lives in leaf pages.
            Some(_) => {}
        }
        cursor += u64::from(header.overflow) + 1;
    }

    debug!(?report, "scan finished");
    Ok(report)
}

fn salvage_leaf<F: KeyFilter, S: RecordSink>(
    header: &PageHeader,
    buf: &[u8],
    filter: &F,
    sink: &mut S,
    report: &mut ScanReport,
) -> Result<()> {
    for index in 0..header.count {
        let element = match LeafElement::decode(buf, index) {
            Ok(element) => element,
            Err(err) => {
                warn!(page_id = header.id.0, index, %err, "leaf element out of bounds, abandoning page");
                return Ok(());
            }
        };
        if element.is_bucket() {
            // Nested and inline buckets are unsupported; anything reachable
            // only through them stays unrecovered.
            report.bucket_entries_skipped += 1;
            continue;
        }
        let key = match element.key(buf, index) {
            Ok(key) => key,
            Err(err) => {
                warn!(page_id = header.id.0, index, %err, "leaf key out of bounds, abandoning page");
                return Ok(());
            }
        };
        let value = match element.value(buf, index) {
            Ok(value) => value,
            Err(err) => {
                warn!(page_id = header.id.0, index, %err, "leaf value out of bounds, abandoning page");
                return Ok(());
            }
        };
        if filter.accept(key) {
            debug!(page_id = header.id.0, key = %hex::encode(key), "record salvaged");
            sink.put(key, value)?;
            report.records += 1;
        }
    }
    Ok(())
}
