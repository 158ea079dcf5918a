//! Tests for object offset scanning.

use carousel_core::model::ObjectKey;
use carousel_core::{ObjectOffsets, OffsetTable, SeekableStream};

fn scan(data: Vec<u8>) -> ObjectOffsets {
    let mut stream = SeekableStream::from_bytes(data);
    ObjectOffsets::scan(&mut stream).unwrap()
}

#[test]
fn test_scan_finds_headers() {
    let table = scan(b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n2 0 obj 42 endobj\n".to_vec());
    assert_eq!(table.header_offset(), 0);
    assert_eq!(table.offset_of(ObjectKey::new(1, 0)), Some(9));
    assert_eq!(table.offset_of(ObjectKey::new(2, 0)), Some(29));
    assert_eq!(table.offset_of(ObjectKey::new(3, 0)), None);
    assert_eq!(
        table.entries(),
        vec![(ObjectKey::new(1, 0), 9), (ObjectKey::new(2, 0), 29)]
    );
}

#[test]
fn test_offsets_are_relative_to_header() {
    let table = scan(b"garbage\r\n%PDF-1.7\n4 2 obj null endobj".to_vec());
    assert_eq!(table.header_offset(), 9);
    assert_eq!(table.offset_of(ObjectKey::new(4, 2)), Some(9));
}

#[test]
fn test_later_definition_wins() {
    let table = scan(b"%PDF-1.7\n3 0 obj (old) endobj\n3 0 obj (new) endobj".to_vec());
    assert_eq!(table.len(), 1);
    assert_eq!(table.offset_of(ObjectKey::new(3, 0)), Some(30));
}

#[test]
fn test_lookalikes_are_ignored() {
    let table = scan(b"%PDF-1.7\nendobj 1 objx x2 0 obj 5 0 obj".to_vec());
    assert_eq!(table.entries(), vec![(ObjectKey::new(5, 0), 32)]);
}

#[test]
fn test_header_split_across_chunks() {
    let mut data = b"%PDF-1.7\n".to_vec();
    for split in [65_532usize, 65_533, 65_534, 65_535] {
        data.truncate(9);
        data.resize(split - 1, b' ');
        data.push(b'\n');
        data.extend_from_slice(b"12 0 obj\n(x)\nendobj\n");
        data.resize(70_000, b' ');
        data.extend_from_slice(b"\n13 0 obj null endobj");

        let table = scan(data.clone());
        assert_eq!(
            table.offset_of(ObjectKey::new(12, 0)),
            Some(split as u64),
            "header at {split}"
        );
        assert_eq!(table.offset_of(ObjectKey::new(13, 0)), Some(70_001));
    }
}

#[test]
fn test_scan_restores_cursor() {
    let mut stream = SeekableStream::from_bytes(&b"%PDF-1.7\n1 0 obj 1 endobj"[..]);
    stream.seek(5);
    let table = ObjectOffsets::scan(&mut stream).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(stream.offset(), 5);
}

#[test]
fn test_table_by_reference() {
    let mut table = ObjectOffsets::new().with_header_offset(3);
    table.insert(ObjectKey::new(1, 0), 10);
    let borrowed: &ObjectOffsets = &table;
    assert_eq!(OffsetTable::offset_of(&borrowed, ObjectKey::new(1, 0)), Some(10));
    assert_eq!(OffsetTable::header_offset(&borrowed), 3);
}
