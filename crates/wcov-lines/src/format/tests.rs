use proptest::prelude::*;

use super::*;

/// Flatten records into `[addr, line, addr, line, ...]` for readable asserts.
fn unpack(table: &[u8]) -> Vec<i32> {
    table
        .chunks_exact(2)
        .flat_map(|r| [i32::from(r[0]), i32::from(i8::from_ne_bytes([r[1]]))])
        .collect()
}

fn format_a_sample() -> Vec<LineEntry> {
    vec![
        LineEntry::new(0, 6, 1),
        LineEntry::new(6, 50, 2),
        LineEntry::new(50, 350, 7),
        LineEntry::new(350, 361, 207),
        LineEntry::new(361, 370, 208),
        LineEntry::new(370, 380, 50),
    ]
}

fn format_b_sample() -> Vec<LineEntry> {
    vec![
        LineEntry::new(0, 6, 1),
        LineEntry::new(6, 50, 2),
        LineEntry::new(50, 350, 7),
        LineEntry::no_line(350, 360),
        LineEntry::new(360, 376, 8),
        LineEntry::new(376, 380, 208),
        LineEntry::new(380, 390, 50),
    ]
}

#[test]
fn test_format_a_literal_records() {
    let table = encode_format_a(0, &format_a_sample()).unwrap();
    assert_eq!(
        unpack(&table),
        [0, 1, 6, 1, 44, 5, 255, 0, 45, 127, 0, 73, 11, 1, 9, -128, 0, -30]
    );
}

#[test]
fn test_format_a_literal_decodes() {
    let table = encode_format_a(0, &format_a_sample()).unwrap();
    assert_eq!(decode_format_a(0, &table, 380).unwrap(), format_a_sample());
}

#[test]
fn test_format_b_literal_records() {
    let table = encode_format_b(0, &format_b_sample()).unwrap();
    assert_eq!(
        unpack(&table),
        [6, 1, 44, 1, 254, 5, 46, 0, 10, -128, 16, 1, 0, 127, 4, 73, 0, -127, 10, -31]
    );
}

#[test]
fn test_format_b_literal_decodes() {
    let table = encode_format_b(0, &format_b_sample()).unwrap();
    assert_eq!(decode_format_b(0, &table, 390).unwrap(), format_b_sample());
}

#[test]
fn test_format_b_long_no_line_range() {
    let entries = [LineEntry::new(0, 2, 5), LineEntry::no_line(2, 600)];
    let table = encode_format_b(5, &entries).unwrap();
    assert_eq!(unpack(&table), [2, 0, 254, -128, 254, -128, 90, -128]);
    assert_eq!(decode_format_b(5, &table, 600).unwrap(), entries);
}

#[test]
fn test_base_line_is_honoured() {
    let entries = [LineEntry::new(0, 4, 10), LineEntry::new(4, 8, 12)];
    assert_eq!(unpack(&encode_format_a(10, &entries).unwrap()), [0, 0, 4, 2]);
    assert_eq!(unpack(&encode_format_b(10, &entries).unwrap()), [4, 0, 4, 2]);
    assert_eq!(
        decode_format_a(10, &encode_format_a(10, &entries).unwrap(), 8).unwrap(),
        entries
    );
}

#[test]
fn test_format_a_rejects_no_line() {
    let entries = [LineEntry::new(0, 4, 1), LineEntry::no_line(4, 8)];
    assert_eq!(
        encode_format_a(0, &entries),
        Err(LineTableError::NoLineUnsupported(1))
    );
}

#[test]
fn test_encode_rejects_malformed_partition() {
    let overlapping = [LineEntry::new(0, 6, 1), LineEntry::new(4, 8, 2)];
    for format in [LineTableFormat::A, LineTableFormat::B] {
        assert!(matches!(
            format.encode(0, &overlapping),
            Err(LineTableError::Discontiguous { index: 1, .. })
        ));
    }
}

#[test]
fn test_decode_errors() {
    assert_eq!(
        decode_format_b(0, &[2, 1, 4], 6),
        Err(LineTableError::OddLength(3))
    );
    assert_eq!(
        decode_format_b(0, &[2, 1], 6),
        Err(LineTableError::LengthMismatch {
            end: 2,
            code_len: 6
        })
    );
    // Line 0 minus one is not a line.
    assert_eq!(
        decode_format_b(0, &[2, 0xFF], 2),
        Err(LineTableError::LineOutOfRange(0))
    );
    assert!(decode_format_a(0, &[10, 1], 4).is_err());
}

#[test]
fn test_decode_coalesces_split_records() {
    // Two ranges on the same line encoded as separate records.
    let table = [4, 3, 6, 0];
    assert_eq!(
        decode_format_b(0, &table, 10).unwrap(),
        [LineEntry::new(0, 10, 3)]
    );
}

#[test]
fn test_empty_table() {
    assert!(encode_format_b(1, &[]).unwrap().is_empty());
    assert!(decode_format_b(1, &[], 0).unwrap().is_empty());
    assert!(decode_format_a(1, &[], 0).unwrap().is_empty());
}

/// Normalized entries: non-empty, neighbours on different lines.
fn entries_strategy(allow_no_line: bool) -> impl Strategy<Value = (u32, Vec<LineEntry>)> {
    let line = if allow_no_line {
        prop_oneof![1 => Just(None), 4 => (0u32..2000).prop_map(Some)].boxed()
    } else {
        (0u32..2000).prop_map(Some).boxed()
    };
    (
        0u32..2000,
        prop::collection::vec((1usize..700, line), 0..40),
    )
        .prop_map(|(base, spans)| {
            let mut entries: Vec<LineEntry> = Vec::new();
            let mut start = 0;
            for (len, line) in spans {
                if entries.last().is_some_and(|e| e.line == line) {
                    continue;
                }
                entries.push(LineEntry {
                    start,
                    end: start + len,
                    line,
                });
                start += len;
            }
            (base, entries)
        })
}

proptest! {
    #[test]
    fn prop_format_a_roundtrip((base, entries) in entries_strategy(false)) {
        let code_len = entries.last().map_or(0, |e| e.end);
        let table = encode_format_a(base, &entries).unwrap();
        prop_assert_eq!(decode_format_a(base, &table, code_len).unwrap(), entries);
    }

    #[test]
    fn prop_format_b_roundtrip((base, entries) in entries_strategy(true)) {
        let code_len = entries.last().map_or(0, |e| e.end);
        let table = encode_format_b(base, &entries).unwrap();
        prop_assert_eq!(decode_format_b(base, &table, code_len).unwrap(), entries);
    }

    #[test]
    fn prop_format_b_records_respect_limits((base, entries) in entries_strategy(true)) {
        let table = encode_format_b(base, &entries).unwrap();
        let mut pos = 0;
        for record in table.chunks_exact(2) {
            let (addr, delta) = (usize::from(record[0]), i8::from_ne_bytes([record[1]]));
            prop_assert!(addr <= 254);
            if addr == 0 {
                prop_assert!((-127..=127).contains(&delta));
                continue;
            }
            // A record with a length covers part of exactly one entry.
            let entry = entries.iter().find(|e| e.start <= pos && pos + addr <= e.end);
            prop_assert!(entry.is_some(), "record {:?} at {} spans entries", record, pos);
            if let Some(entry) = entry {
                if delta == -128 {
                    prop_assert_eq!(entry.line, None);
                } else {
                    prop_assert!(entry.line.is_some());
                    prop_assert!((-127..=127).contains(&delta));
                }
            }
            pos += addr;
        }
        prop_assert_eq!(pos, entries.last().map_or(0, |e| e.end));
    }

    #[test]
    fn prop_format_a_records_reach_every_entry((base, entries) in entries_strategy(false)) {
        let table = encode_format_a(base, &entries).unwrap();
        let mut pos = 0;
        let mut line = i64::from(base);
        let mut reached = Vec::new();
        for record in table.chunks_exact(2) {
            let (addr, delta) = (usize::from(record[0]), i8::from_ne_bytes([record[1]]));
            // Address overflow records never move the line.
            if addr == 255 && delta != 0 {
                prop_assert!(entries.iter().any(|e| e.start == pos + addr));
            }
            pos += addr;
            line += i64::from(delta);
            reached.push((pos, line));
        }
        let starts: Vec<(usize, i64)> = entries
            .iter()
            .map(|e| (e.start, i64::from(e.line.unwrap_or_default())))
            .collect();
        for at in &starts {
            prop_assert!(reached.contains(at), "entry start {:?} never reached", at);
        }
        prop_assert_eq!(reached.last(), starts.last());
    }
}
