//! Shared helpers for building synthetic store files in tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::Path;

use boltsalvage::error::Result;
use boltsalvage::format::leaf::{LeafElement, LEAF_ELEM_LEN};
use boltsalvage::format::meta::{InBucket, Meta};
use boltsalvage::format::{PageHeader, PageId, PageKind, MAGIC, PAGE_HDR_LEN, VERSION};
use boltsalvage::io;
use boltsalvage::scan::RecordSink;

/// A 17-byte revision key: two zero-padded counters around the separator.
pub fn revision_key(main: u32, sub: u32) -> Vec<u8> {
    format!("{main:08}_{sub:08}").into_bytes()
}

/// Encodes a valid meta page (header plus checksummed body) of `buf_len`
/// bytes declaring `page_size`.
pub fn meta_page(id: u64, page_size: u32, buf_len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; buf_len];
    PageHeader::new(PageId(id), PageKind::Meta, 0, 0)
        .encode(&mut buf)
        .unwrap();
    Meta {
        magic: MAGIC,
        version: VERSION,
        page_size,
        flags: 0,
        root: InBucket {
            root: PageId(3),
            sequence: 0,
        },
        freelist: PageId(2),
        pgid: PageId(4),
        txid: id,
        checksum: 0,
    }
    .encode(&mut buf)
    .unwrap();
    buf
}

/// Encodes a single-block leaf page holding the given
/// `(flags, key, value)` elements.
pub fn leaf_page(id: u64, page_size: u32, elems: &[(u32, &[u8], &[u8])]) -> Vec<u8> {
    let mut page = vec![0u8; page_size as usize];
    PageHeader::new(PageId(id), PageKind::Leaf, elems.len() as u16, 0)
        .encode(&mut page)
        .unwrap();
    let mut data = PAGE_HDR_LEN + elems.len() * LEAF_ELEM_LEN;
    for (index, (flags, key, value)) in elems.iter().enumerate() {
        let offset = PAGE_HDR_LEN + index * LEAF_ELEM_LEN;
        LeafElement {
            flags: *flags,
            pos: (data - offset) as u32,
            ksize: key.len() as u32,
            vsize: value.len() as u32,
        }
        .encode(&mut page, index as u16)
        .unwrap();
        page[data..data + key.len()].copy_from_slice(key);
        data += key.len();
        page[data..data + value.len()].copy_from_slice(value);
        data += value.len();
    }
    page
}

/// Encodes an empty page of the given kind.
pub fn plain_page(id: u64, kind: PageKind, page_size: u32) -> Vec<u8> {
    let mut page = vec![0u8; page_size as usize];
    PageHeader::new(PageId(id), kind, 0, 0)
        .encode(&mut page)
        .unwrap();
    page
}

/// Creates a file of `len` bytes with the given byte regions written at
/// their offsets.
pub fn write_file(path: &Path, len: u64, regions: &[(u64, Vec<u8>)]) -> File {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .unwrap();
    file.set_len(len).unwrap();
    for (offset, bytes) in regions {
        io::write_all(&file, *offset, bytes).unwrap();
    }
    file
}

/// Concatenates whole pages into a file.
pub fn write_pages(path: &Path, pages: &[Vec<u8>]) -> (File, u64) {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .unwrap();
    let mut offset = 0u64;
    for page in pages {
        io::write_all(&file, offset, page).unwrap();
        offset += page.len() as u64;
    }
    (file, offset)
}

/// Sink collecting records into an ordered map, mirroring the
/// last-write-wins contract.
#[derive(Default)]
pub struct MapSink {
    pub records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl RecordSink for MapSink {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.records.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
