//! End-to-end salvage runs over synthetic and rebuilt store files.

mod util;

use std::collections::BTreeMap;

use boltsalvage::build::StoreBuilder;
use boltsalvage::classify::RevisionKeyFilter;
use boltsalvage::detect::detect_page_size;
use boltsalvage::format::leaf::BUCKET_LEAF_FLAG;
use boltsalvage::format::PageKind;
use boltsalvage::scan::{scan, RecordSink};
use proptest::prelude::*;
use tempfile::tempdir;
use util::{leaf_page, meta_page, plain_page, revision_key, write_pages, MapSink};

const PAGE_SIZE: u32 = 4096;

fn pages_with_metas(mut data_pages: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut pages = vec![
        meta_page(0, PAGE_SIZE, PAGE_SIZE as usize),
        meta_page(1, PAGE_SIZE, PAGE_SIZE as usize),
    ];
    pages.append(&mut data_pages);
    // Trailing page so the scanner's loop bound covers the last data page.
    pages.push(plain_page(pages.len() as u64, PageKind::Freelist, PAGE_SIZE));
    pages
}

#[test]
fn bucket_entry_yields_no_put() {
    let dir = tempdir().unwrap();
    let key = revision_key(1, 1);
    let pages = pages_with_metas(vec![leaf_page(
        2,
        PAGE_SIZE,
        &[
            (BUCKET_LEAF_FLAG, b"inline-bucket", &[0u8; 16]),
            (0, &key, b"plain-value"),
        ],
    )]);
    let (file, file_size) = write_pages(&dir.path().join("bucket.db"), &pages);

    let mut sink = MapSink::default();
    let report = scan(
        &file,
        PAGE_SIZE,
        file_size,
        &RevisionKeyFilter::default(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(report.bucket_entries_skipped, 1);
    assert_eq!(sink.records.len(), 1);
    assert_eq!(sink.records.get(&key).unwrap(), b"plain-value");
}

#[test]
fn rejected_middle_element_skipped() {
    let dir = tempdir().unwrap();
    let first = revision_key(1, 1);
    let third = revision_key(3, 3);
    let pages = pages_with_metas(vec![leaf_page(
        2,
        PAGE_SIZE,
        &[
            (0, &first, b"a"),
            (0, b"meta-bookkeeping-entry", b"noise"),
            (0, &third, b"c"),
        ],
    )]);
    let (file, file_size) = write_pages(&dir.path().join("middle.db"), &pages);

    let mut sink = MapSink::default();
    let report = scan(
        &file,
        PAGE_SIZE,
        file_size,
        &RevisionKeyFilter::default(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(report.records, 2);
    assert!(sink.records.contains_key(&first));
    assert!(sink.records.contains_key(&third));
    assert!(!sink.records.contains_key(&b"meta-bookkeeping-entry"[..]));
}

#[test]
fn shredded_region_does_not_stop_the_scan() {
    let dir = tempdir().unwrap();
    let early = revision_key(1, 0);
    let late = revision_key(9, 0);
    let mut shredded = vec![0xFFu8; PAGE_SIZE as usize];
    shredded[0..8].copy_from_slice(&999u64.to_le_bytes()); // id never matches index 3
    let pages = pages_with_metas(vec![
        leaf_page(2, PAGE_SIZE, &[(0, &early, b"early")]),
        shredded,
        leaf_page(4, PAGE_SIZE, &[(0, &late, b"late")]),
    ]);
    let (file, file_size) = write_pages(&dir.path().join("shredded.db"), &pages);

    let mut sink = MapSink::default();
    let report = scan(
        &file,
        PAGE_SIZE,
        file_size,
        &RevisionKeyFilter::default(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(report.unreadable_pages, 1);
    assert_eq!(report.records, 2);
    assert_eq!(sink.records.get(&early).unwrap(), b"early");
    assert_eq!(sink.records.get(&late).unwrap(), b"late");
}

#[test]
fn built_store_roundtrips_through_detection_and_scan() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("rebuilt.db");

    // Enough records to force multiple leaf pages and a branch level,
    // plus one oversized value that needs an overflow page.
    let mut expected: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    for i in 0..500u32 {
        expected.insert(revision_key(i, i % 7), format!("value-{i}").into_bytes());
    }
    expected.insert(revision_key(9999, 0), vec![b'x'; 3 * PAGE_SIZE as usize]);

    let mut builder = StoreBuilder::new(&output, b"key");
    for (key, value) in &expected {
        builder.put(key, value).unwrap();
    }
    let committed = builder.commit(PAGE_SIZE).unwrap();
    assert_eq!(committed, expected.len() as u64);

    let file = std::fs::File::open(&output).unwrap();
    let page_size = detect_page_size(&file).unwrap();
    assert_eq!(page_size, PAGE_SIZE);
    let file_size = file.metadata().unwrap().len();
    assert_eq!(file_size % u64::from(PAGE_SIZE), 0);

    let mut sink = MapSink::default();
    let report = scan(
        &file,
        page_size,
        file_size,
        &RevisionKeyFilter::default(),
        &mut sink,
    )
    .unwrap();

    // The builder writes the root-bucket page last, which the scanner's
    // conservative loop bound leaves unvisited; no record lives there.
    assert_eq!(report.bucket_entries_skipped, 0);
    assert_eq!(report.unreadable_pages, 0);
    assert_eq!(sink.records, expected);
}

#[test]
fn salvage_then_rebuild_then_salvage_again_is_stable() {
    let dir = tempdir().unwrap();
    let key_a = revision_key(10, 1);
    let key_b = revision_key(20, 2);
    let pages = pages_with_metas(vec![leaf_page(
        2,
        PAGE_SIZE,
        &[(0, &key_a, b"alpha"), (0, &key_b, b"beta")],
    )]);
    let (file, file_size) = write_pages(&dir.path().join("source.db"), &pages);

    let rebuilt_path = dir.path().join("rebuilt.db");
    let mut builder = StoreBuilder::new(&rebuilt_path, b"key");
    scan(
        &file,
        PAGE_SIZE,
        file_size,
        &RevisionKeyFilter::default(),
        &mut builder,
    )
    .unwrap();
    builder.commit(PAGE_SIZE).unwrap();

    let rebuilt = std::fs::File::open(&rebuilt_path).unwrap();
    let rebuilt_size = rebuilt.metadata().unwrap().len();
    let mut sink = MapSink::default();
    scan(
        &rebuilt,
        detect_page_size(&rebuilt).unwrap(),
        rebuilt_size,
        &RevisionKeyFilter::default(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(sink.records.len(), 2);
    assert_eq!(sink.records.get(&key_a).unwrap(), b"alpha");
    assert_eq!(sink.records.get(&key_b).unwrap(), b"beta");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // The cursor advances every iteration, so even a file of pure noise is
    // visited at most file_size / page_size times and the scan terminates.
    #[test]
    fn random_noise_never_breaks_the_iteration_bound(
        pages in 3usize..24,
        noise in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let page_size = 512u32;
        let dir = tempdir().unwrap();
        let mut bytes = vec![0u8; pages * page_size as usize];
        for (i, b) in noise.iter().enumerate() {
            let at = (i * 37) % bytes.len();
            bytes[at] = *b;
        }
        let (file, file_size) = write_pages(&dir.path().join("noise.db"), &[bytes]);

        let mut sink = MapSink::default();
        let report = scan(
            &file,
            page_size,
            file_size,
            &RevisionKeyFilter::default(),
            &mut sink,
        ).unwrap();
        prop_assert!(report.pages_visited <= file_size / u64::from(page_size));
    }
}
