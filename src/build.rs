//! Writes a fresh, valid store file from salvaged records.
//!
//! The builder is the crate's concrete [`RecordSink`]: `put` collects
//! records into an ordered map (last write wins), and [`StoreBuilder::commit`]
//! bulk-builds a complete file in the bolt page format: two meta slots, an
//! empty freelist, sorted leaf pages (with overflow blocks for records that
//! do not fit a single page), branch levels built bottom-up, and a
//! root-bucket page holding one named bucket that points at the record
//! tree. Every page id equals its file index and both meta checksums
//! validate, so the result opens like any healthy store.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Result, SalvageError};
use crate::format::leaf::{BranchElement, LeafElement, BRANCH_ELEM_LEN, BUCKET_LEAF_FLAG, LEAF_ELEM_LEN};
use crate::format::meta::{InBucket, Meta};
use crate::format::{PageHeader, PageId, PageKind, MAGIC, PAGE_HDR_LEN, VERSION};
use crate::io;
use crate::scan::RecordSink;

/// Smallest page size the builder accepts for the output file.
pub const MIN_PAGE_SIZE: u32 = 512;

/// Page index reserved for the freelist of a freshly built store.
const FREELIST_PAGE: u64 = 2;

/// Collects records and commits them as a fresh store file.
pub struct StoreBuilder {
    path: PathBuf,
    bucket: Vec<u8>,
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl RecordSink for StoreBuilder {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.records.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl StoreBuilder {
    /// Creates a builder that will write its output to `path`, placing all
    /// records into the bucket named `bucket`.
    pub fn new(path: impl AsRef<Path>, bucket: &[u8]) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            bucket: bucket.to_vec(),
            records: BTreeMap::new(),
        }
    }

    /// Number of distinct records collected so far.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Writes the output file and returns the number of records stored.
    ///
    /// The target file is created (or truncated) and synced; the builder
    /// is consumed either way.
    pub fn commit(self, page_size: u32) -> Result<u64> {
        if page_size < MIN_PAGE_SIZE {
            return Err(SalvageError::Invalid("page size below builder minimum"));
        }

        // Indices 0-2 are placeholders until the tree is laid out.
        let mut pages: Vec<Vec<u8>> = vec![Vec::new(), Vec::new(), Vec::new()];
        let mut next_id: u64 = FREELIST_PAGE + 1;

        let leaves = pack_level(
            self.records.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
            |(key, value)| LEAF_ELEM_LEN + key.len() + value.len(),
            page_size,
        );
        let mut level: Vec<(Vec<u8>, PageId)> = Vec::new();
        for group in &leaves {
            level.push(emit_leaf(&mut pages, &mut next_id, page_size, group, 0)?);
        }
        if level.is_empty() {
            // The bucket still needs a root page even with nothing salvaged.
            level.push(emit_leaf(&mut pages, &mut next_id, page_size, &[], 0)?);
        }

        while level.len() > 1 {
            let groups = pack_level(
                level.into_iter(),
                |(key, _)| BRANCH_ELEM_LEN + key.len(),
                page_size,
            );
            let mut parents = Vec::new();
            for group in &groups {
                parents.push(emit_branch(&mut pages, &mut next_id, page_size, group)?);
            }
            level = parents;
        }
        let tree_root = level[0].1;

        let mut bucket_value = [0u8; 16];
        bucket_value[0..8].copy_from_slice(&tree_root.0.to_le_bytes());
        let (_, bucket_root) = emit_leaf(
            &mut pages,
            &mut next_id,
            page_size,
            &[(self.bucket.as_slice(), &bucket_value)],
            BUCKET_LEAF_FLAG,
        )?;

        let mut freelist = vec![0u8; page_size as usize];
        PageHeader::new(PageId(FREELIST_PAGE), PageKind::Freelist, 0, 0).encode(&mut freelist)?;
        pages[FREELIST_PAGE as usize] = freelist;

        for (slot, txid) in [(0u64, 0u64), (1, 1)] {
            let mut buf = vec![0u8; page_size as usize];
            PageHeader::new(PageId(slot), PageKind::Meta, 0, 0).encode(&mut buf)?;
            Meta {
                magic: MAGIC,
                version: VERSION,
                page_size,
                flags: 0,
                root: InBucket {
                    root: bucket_root,
                    sequence: 0,
                },
                freelist: PageId(FREELIST_PAGE),
                pgid: PageId(next_id),
                txid,
                checksum: 0,
            }
            .encode(&mut buf)?;
            pages[slot as usize] = buf;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        let mut offset = 0u64;
        for page in &pages {
            io::write_all(&file, offset, page)?;
            offset += page.len() as u64;
        }
        file.sync_all()?;

        let records = self.records.len() as u64;
        info!(
            records,
            pages = next_id,
            path = %self.path.display(),
            "fresh store committed"
        );
        Ok(records)
    }
}

/// Greedily groups sorted entries into page-sized runs. `cost` is the
/// on-page byte cost of one entry, header included; an entry too large for
/// an empty page gets a run of its own and later becomes an overflow page.
fn pack_level<T>(
    entries: impl Iterator<Item = T>,
    cost: impl Fn(&T) -> usize,
    page_size: u32,
) -> Vec<Vec<T>> {
    let capacity = page_size as usize - PAGE_HDR_LEN;
    let mut groups = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut used = 0usize;
    for entry in entries {
        let entry_cost = cost(&entry);
        let full = used + entry_cost > capacity || current.len() == usize::from(u16::MAX);
        if full && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(entry);
        used += entry_cost;
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

fn block_count(body: usize, page_size: u32) -> usize {
    let total = PAGE_HDR_LEN + body;
    total.div_ceil(page_size as usize)
}

fn emit_leaf(
    pages: &mut Vec<Vec<u8>>,
    next_id: &mut u64,
    page_size: u32,
    elems: &[(&[u8], &[u8])],
    flags: u32,
) -> Result<(Vec<u8>, PageId)> {
    let id = PageId(*next_id);
    let body: usize = elems
        .iter()
        .map(|(k, v)| LEAF_ELEM_LEN + k.len() + v.len())
        .sum();
    let blocks = block_count(body, page_size);
    let mut buf = vec![0u8; blocks * page_size as usize];
    PageHeader::new(id, PageKind::Leaf, elems.len() as u16, (blocks - 1) as u32)
        .encode(&mut buf)?;
    let mut data = PAGE_HDR_LEN + elems.len() * LEAF_ELEM_LEN;
    for (index, (key, value)) in elems.iter().enumerate() {
        let offset = PAGE_HDR_LEN + index * LEAF_ELEM_LEN;
        LeafElement {
            flags,
            pos: (data - offset) as u32,
            ksize: key.len() as u32,
            vsize: value.len() as u32,
        }
        .encode(&mut buf, index as u16)?;
        buf[data..data + key.len()].copy_from_slice(key);
        data += key.len();
        buf[data..data + value.len()].copy_from_slice(value);
        data += value.len();
    }
    let first_key = elems.first().map(|(k, _)| k.to_vec()).unwrap_or_default();
    pages.push(buf);
    *next_id += blocks as u64;
    Ok((first_key, id))
}

fn emit_branch(
    pages: &mut Vec<Vec<u8>>,
    next_id: &mut u64,
    page_size: u32,
    children: &[(Vec<u8>, PageId)],
) -> Result<(Vec<u8>, PageId)> {
    let id = PageId(*next_id);
    let body: usize = children
        .iter()
        .map(|(key, _)| BRANCH_ELEM_LEN + key.len())
        .sum();
    let blocks = block_count(body, page_size);
    let mut buf = vec![0u8; blocks * page_size as usize];
    PageHeader::new(id, PageKind::Branch, children.len() as u16, (blocks - 1) as u32)
        .encode(&mut buf)?;
    let mut data = PAGE_HDR_LEN + children.len() * BRANCH_ELEM_LEN;
    for (index, (key, child)) in children.iter().enumerate() {
        let offset = PAGE_HDR_LEN + index * BRANCH_ELEM_LEN;
        BranchElement {
            pos: (data - offset) as u32,
            ksize: key.len() as u32,
            pgid: *child,
        }
        .encode(&mut buf, index as u16)?;
        buf[data..data + key.len()].copy_from_slice(key);
        data += key.len();
    }
    let first_key = children[0].0.clone();
    pages.push(buf);
    *next_id += blocks as u64;
    Ok((first_key, id))
}
