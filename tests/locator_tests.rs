//! Tests for the Locator
//!
//! These tests verify:
//! - Key and record reads at arbitrary offsets
//! - Window classification
//! - Midpoint selection always lands on a record boundary
//! - Binary search finds records and insertion points

use std::fs;

use flatkv::storage::{Location, Locator, PositionalFile, Probe, Record};
use flatkv::{FlatError, StoreConfig};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const WORKED: &[u8] = b"alice\tA\nbob\tB\ncarol\tC\n";

fn setup_file(content: &[u8]) -> (TempDir, PositionalFile) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.db");
    fs::write(&path, content).unwrap();
    let file = PositionalFile::open(&path, 10).unwrap();
    (temp_dir, file)
}

fn numbered_records(count: usize, record_delimiter: &[u8], field_delimiter: &[u8]) -> Vec<u8> {
    let mut content = Vec::new();
    for i in 0..count {
        content.extend_from_slice(format!("key{:04}", i).as_bytes());
        content.extend_from_slice(field_delimiter);
        content.extend_from_slice(format!("value{}", i).as_bytes());
        content.extend_from_slice(record_delimiter);
    }
    content
}

/// Offsets at which records start, plus the file size
fn boundaries(content: &[u8], record_delimiter: &[u8]) -> Vec<u64> {
    let mut result = vec![0];
    let mut i = 0;
    while i + record_delimiter.len() <= content.len() {
        if &content[i..i + record_delimiter.len()] == record_delimiter {
            i += record_delimiter.len();
            result.push(i as u64);
        } else {
            i += 1;
        }
    }
    result
}

// =============================================================================
// Record Read Tests
// =============================================================================

#[test]
fn test_read_key() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.read_key(0).unwrap(), b"alice".to_vec());
    assert_eq!(locator.read_key(8).unwrap(), b"bob".to_vec());
    assert_eq!(locator.read_key(14).unwrap(), b"carol".to_vec());
}

#[test]
fn test_read_key_truncates_long_key() {
    let (_temp, mut file) = setup_file(b"abcdefgh\tv\n");
    let config = StoreConfig::builder().max_key_length(4).build();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.read_key(0).unwrap(), b"abcd".to_vec());
}

#[test]
fn test_read_key_exactly_max_length() {
    let (_temp, mut file) = setup_file(b"abcd\tv\n");
    let config = StoreConfig::builder().max_key_length(4).build();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.read_key(0).unwrap(), b"abcd".to_vec());
}

#[test]
fn test_read_key_record_without_field_delimiter() {
    let (_temp, mut file) = setup_file(b"abc\nxyz\tv\n");
    let config = StoreConfig::builder().max_key_length(10).build();
    let mut locator = Locator::new(&mut file, &config);

    let result = locator.read_key(0);

    assert!(matches!(result, Err(FlatError::ReadBoundary(_))));
}

#[test]
fn test_read_key_short_at_eof() {
    let (_temp, mut file) = setup_file(b"abc");
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    let result = locator.read_key(0);

    assert!(matches!(result, Err(FlatError::ReadBoundary(_))));
}

#[test]
fn test_read_pair() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    let record = locator.read_pair(8).unwrap();

    assert_eq!(record, Record::new(b"bob".to_vec(), b"B".to_vec()));
    assert_eq!(record.len(b"\t", b"\n"), 6);
    assert_eq!(locator.read_data(14).unwrap(), b"C".to_vec());
}

#[test]
fn test_read_pair_past_end() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    let result = locator.read_pair(WORKED.len() as u64);

    assert!(matches!(result, Err(FlatError::ReadBoundary(_))));
}

#[test]
fn test_read_pair_unterminated() {
    let (_temp, mut file) = setup_file(b"key\tvalue");
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    let result = locator.read_pair(0);

    assert!(matches!(result, Err(FlatError::ReadBoundary(_))));
}

#[test]
fn test_record_to_bytes() {
    let record = Record::new(b"k".to_vec(), b"v".to_vec());

    assert_eq!(&record.to_bytes(b"||", b"\r\n")[..], b"k||v\r\n");
    assert_eq!(record.len(b"||", b"\r\n"), 6);
}

// =============================================================================
// Probe Tests
// =============================================================================

#[test]
fn test_probe_classification() {
    assert_eq!(Locator::probe(b"b", b"b", None), Probe::IsStart);
    assert_eq!(Locator::probe(b"a", b"b", Some(b"d")), Probe::BeforeStart);
    assert_eq!(Locator::probe(b"d", b"b", Some(b"d")), Probe::IsEnd);
    assert_eq!(Locator::probe(b"e", b"b", Some(b"d")), Probe::AfterEnd);
    assert_eq!(Locator::probe(b"c", b"b", Some(b"d")), Probe::Between);
    assert_eq!(Locator::probe(b"z", b"b", None), Probe::Between);
}

#[test]
fn test_compare_is_bytewise() {
    use std::cmp::Ordering;

    assert_eq!(Locator::compare(b"B", b"a"), Ordering::Less);
    assert_eq!(Locator::compare(b"ab", b"abc"), Ordering::Less);
    assert_eq!(Locator::compare(b"%7E", b"%41"), Ordering::Greater);
    assert_eq!(Locator::compare(b"same", b"same"), Ordering::Equal);
}

// =============================================================================
// Middle Tests
// =============================================================================

#[test]
fn test_middle_single_record() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.middle(0, 8).unwrap(), None);
    assert_eq!(locator.middle(8, 14).unwrap(), None);
    assert_eq!(locator.middle(14, 22).unwrap(), None);
}

#[test]
fn test_middle_splits_worked_example() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.middle(0, 22).unwrap(), Some(14));
    assert_eq!(locator.middle(0, 14).unwrap(), Some(8));
}

#[test]
fn test_middle_empty_range() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.middle(8, 8).unwrap(), None);
    assert_eq!(locator.middle(8, 9).unwrap(), None);
}

#[test]
fn test_middle_every_window_lands_on_boundary() {
    let content = numbered_records(40, b"\n", b"\t");
    let bounds = boundaries(&content, b"\n");
    let (_temp, mut file) = setup_file(&content);
    let config = StoreConfig::builder().middle_buffer_size(8).build();
    let mut locator = Locator::new(&mut file, &config);

    for (i, &start) in bounds.iter().enumerate() {
        for &end in &bounds[i + 1..] {
            let split = locator.middle(start, end).unwrap();
            let records = bounds.iter().filter(|&&b| b > start && b <= end).count();

            if records == 1 {
                assert_eq!(split, None, "window {}..{}", start, end);
            } else {
                let p = split.unwrap_or_else(|| panic!("no split in {}..{}", start, end));
                assert!(p > start && p < end, "split {} outside {}..{}", p, start, end);
                assert!(bounds.contains(&p), "split {} is not a boundary", p);
            }
        }
    }
}

#[test]
fn test_middle_multibyte_delimiter() {
    let content = numbered_records(25, b"\r\n", b"||");
    let bounds = boundaries(&content, b"\r\n");
    let (_temp, mut file) = setup_file(&content);
    let config = StoreConfig::builder()
        .record_delimiter("\r\n")
        .field_delimiter("||")
        .middle_buffer_size(4)
        .build();
    let mut locator = Locator::new(&mut file, &config);

    for (i, &start) in bounds.iter().enumerate() {
        for &end in bounds.iter().skip(i + 2) {
            let p = locator.middle(start, end).unwrap().unwrap();
            assert!(p > start && p < end);
            assert!(bounds.contains(&p));
        }
    }
}

#[test]
fn test_middle_large_records_around_midpoint() {
    // 20000-byte and 20001-byte records: the only inner boundary sits right
    // at the midpoint and the back half holds no usable delimiter
    let mut content = b"a\t".to_vec();
    content.extend(std::iter::repeat(b'x').take(19_997));
    content.push(b'\n');
    content.extend_from_slice(b"b\t");
    content.extend(std::iter::repeat(b'y').take(19_998));
    content.push(b'\n');
    assert_eq!(content.len(), 40_001);

    let (_temp, mut file) = setup_file(&content);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.middle(0, 40_001).unwrap(), Some(20_000));
    assert_eq!(locator.seek(b"a").unwrap(), Location::Found(0));
    assert_eq!(locator.seek(b"b").unwrap(), Location::Found(20_000));
    assert_eq!(locator.seek(b"ab").unwrap(), Location::Missing(20_000));
    assert_eq!(locator.seek(b"c").unwrap(), Location::Missing(40_001));
}

#[test]
fn test_middle_equal_large_records() {
    let mut content = Vec::new();
    for key in [b'a', b'b'] {
        content.push(key);
        content.push(b'\t');
        content.extend(std::iter::repeat(b'v').take(19_997));
        content.push(b'\n');
    }

    let (_temp, mut file) = setup_file(&content);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.middle(0, 40_000).unwrap(), Some(20_000));
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_empty_file() {
    let (_temp, mut file) = setup_file(b"");
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.seek(b"anything").unwrap(), Location::Missing(0));
}

#[test]
fn test_seek_worked_example() {
    let (_temp, mut file) = setup_file(WORKED);
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.seek(b"alice").unwrap(), Location::Found(0));
    assert_eq!(locator.seek(b"bob").unwrap(), Location::Found(8));
    assert_eq!(locator.seek(b"carol").unwrap(), Location::Found(14));

    assert_eq!(locator.seek(b"aaa").unwrap(), Location::Missing(0));
    assert_eq!(locator.seek(b"b").unwrap(), Location::Missing(8));
    assert_eq!(locator.seek(b"bz").unwrap(), Location::Missing(14));
    assert_eq!(locator.seek(b"zed").unwrap(), Location::Missing(22));
}

#[test]
fn test_seek_single_record() {
    let (_temp, mut file) = setup_file(b"m\t1\n");
    let config = StoreConfig::default();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.seek(b"m").unwrap(), Location::Found(0));
    assert_eq!(locator.seek(b"a").unwrap(), Location::Missing(0));
    assert_eq!(locator.seek(b"z").unwrap(), Location::Missing(4));
}

#[test]
fn test_seek_every_key_and_gap() {
    let content = numbered_records(300, b"\n", b"\t");
    let bounds = boundaries(&content, b"\n");
    let (_temp, mut file) = setup_file(&content);
    let config = StoreConfig::builder().middle_buffer_size(16).build();
    let mut locator = Locator::new(&mut file, &config);

    for i in 0..300 {
        let key = format!("key{:04}", i);
        assert_eq!(locator.seek(key.as_bytes()).unwrap(), Location::Found(bounds[i]));

        // Sorts after key{i} and before key{i+1}
        let gap = format!("key{:04}a", i);
        assert_eq!(locator.seek(gap.as_bytes()).unwrap(), Location::Missing(bounds[i + 1]));
    }
}

#[test]
fn test_seek_multibyte_delimiters() {
    let content = numbered_records(50, b"\r\n", b"||");
    let bounds = boundaries(&content, b"\r\n");
    let (_temp, mut file) = setup_file(&content);
    let config = StoreConfig::builder()
        .record_delimiter("\r\n")
        .field_delimiter("||")
        .build();
    let mut locator = Locator::new(&mut file, &config);

    for i in 0..50 {
        let key = format!("key{:04}", i);
        assert_eq!(locator.seek(key.as_bytes()).unwrap(), Location::Found(bounds[i]));
    }
    assert_eq!(locator.seek(b"zzz").unwrap(), Location::Missing(content.len() as u64));
}

#[test]
fn test_seek_compares_key_prefix_only() {
    let (_temp, mut file) = setup_file(b"abcdefgh\tv\n");
    let config = StoreConfig::builder().max_key_length(4).build();
    let mut locator = Locator::new(&mut file, &config);

    assert_eq!(locator.seek(b"abcdZZZZ").unwrap(), Location::Found(0));
    assert_eq!(locator.seek(b"abce").unwrap(), Location::Missing(11));
}

#[test]
fn test_location_accessors() {
    assert!(Location::Found(3).is_found());
    assert!(!Location::Missing(3).is_found());
    assert_eq!(Location::Missing(7).position(), 7);
}
