//! Integration tests for chunk-boundary independence of the reader.
//!
//! A `ChunkedSource` hands bytes to the reader in caller-chosen pieces so
//! every split position of a multi-byte sequence can be exercised through
//! real refills.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;

use open_midrange_ccsid::{
    CcsidError, ConvTable, ConvTableReader, ReaderOptions, TableCategory, TableRegistry,
};

/// Byte source that returns at most one queued chunk per `read` call.
struct ChunkedSource {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkedSource {
    fn split(bytes: &[u8], cuts: &[usize]) -> Self {
        let mut chunks = VecDeque::new();
        let mut start = 0;
        for &cut in cuts {
            chunks.push_back(bytes[start..cut].to_vec());
            start = cut;
        }
        chunks.push_back(bytes[start..].to_vec());
        Self { chunks }
    }
}

impl Read for ChunkedSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let Some(front) = self.chunks.front_mut() else {
                return Ok(0);
            };
            if front.is_empty() {
                self.chunks.pop_front();
                continue;
            }
            let n = front.len().min(buf.len());
            buf[..n].copy_from_slice(&front[..n]);
            front.drain(..n);
            return Ok(n);
        }
    }
}

fn read_all<R: Read>(reader: &mut ConvTableReader<R>) -> Result<String, CcsidError> {
    reader.chars().collect()
}

fn table(registry: &TableRegistry, ccsid: u16) -> Arc<ConvTable> {
    registry.table(ccsid).unwrap()
}

// =========================================================================
// Double-byte
// =========================================================================

#[test]
fn test_double_byte_three_plus_three() {
    let registry = TableRegistry::new();
    let bytes = [0x00, 0x41, 0x00, 0x42, 0x00, 0x43];

    let mut whole = ConvTableReader::new(&bytes[..], table(&registry, 13488));
    let expected = read_all(&mut whole).unwrap();
    assert_eq!(expected, "ABC");

    let source = ChunkedSource::split(&bytes, &[3]);
    let mut split = ConvTableReader::new(source, table(&registry, 13488));
    assert_eq!(read_all(&mut split).unwrap(), expected);
}

#[test]
fn test_double_byte_odd_stream_is_malformed() {
    let registry = TableRegistry::new();
    let source = ChunkedSource::split(&[0x00, 0x41, 0x00], &[1]);
    let mut reader = ConvTableReader::new(source, table(&registry, 13488));
    assert_eq!(reader.read_char().unwrap(), Some('A'));
    let err = reader.read_char().unwrap_err();
    assert!(matches!(
        err,
        CcsidError::MalformedSequence { ccsid: 13488, pending: 1 }
    ));
}

// =========================================================================
// Mixed-byte
// =========================================================================

#[test]
fn test_mixed_every_split_point() {
    let registry = TableRegistry::new();
    // SO, full-width A, full-width B, SI
    let bytes = [0x0E, 0x42, 0xC1, 0x42, 0xC2, 0x0F];
    for cut in 0..=bytes.len() {
        let source = ChunkedSource::split(&bytes, &[cut]);
        let mut reader = ConvTableReader::new(source, table(&registry, 933));
        assert_eq!(read_all(&mut reader).unwrap(), "ＡＢ", "split at {}", cut);
    }
}

#[test]
fn test_mixed_every_pair_of_split_points() {
    let registry = TableRegistry::new();
    let bytes = [0xC1, 0x0E, 0x42, 0xC1, 0x40, 0x40, 0x0F, 0xC2];
    for first in 0..=bytes.len() {
        for second in first..=bytes.len() {
            let source = ChunkedSource::split(&bytes, &[first, second]);
            let mut reader = ConvTableReader::new(source, table(&registry, 933));
            assert_eq!(
                read_all(&mut reader).unwrap(),
                "AＡ\u{3000}B",
                "splits at {} and {}",
                first,
                second
            );
        }
    }
}

#[test]
fn test_mixed_small_cache() {
    let registry = TableRegistry::new();
    let cp933 = table(&registry, 933);
    let text = "HELLO ＡＢＣ WORLD ０１２";
    let bytes = cp933.encode(text).unwrap();
    let options = ReaderOptions { cache_size: 1 };
    let mut reader = ConvTableReader::with_options(&bytes[..], cp933, &options).unwrap();
    assert_eq!(reader.category(), TableCategory::MixedByte);
    assert_eq!(read_all(&mut reader).unwrap(), text);
}

// =========================================================================
// UTF-8
// =========================================================================

#[test]
fn test_utf8_four_byte_char_split() {
    let registry = TableRegistry::new();
    let bytes = "x😀y".as_bytes();
    // The emoji occupies bytes 1..5; cut after 1, 2 and 3 of its bytes.
    for cut in [2, 3, 4] {
        let source = ChunkedSource::split(bytes, &[cut]);
        let mut reader = ConvTableReader::new(source, table(&registry, 1208));
        assert_eq!(read_all(&mut reader).unwrap(), "x😀y", "split at {}", cut);
    }
}

#[test]
fn test_utf8_split_with_full_refill() {
    let registry = TableRegistry::new();
    let text = "ab😀cd€";
    let options = ReaderOptions { cache_size: 3 };
    let mut reader =
        ConvTableReader::with_options(text.as_bytes(), table(&registry, 1208), &options).unwrap();
    assert_eq!(read_all(&mut reader).unwrap(), text);
}

#[test]
fn test_utf8_eof_mid_sequence() {
    let registry = TableRegistry::new();
    let mut reader = ConvTableReader::new(&[0x61, 0xF0, 0x9F, 0x98][..], table(&registry, 1208));
    assert_eq!(reader.read_char().unwrap(), Some('a'));
    let err = reader.read_char().unwrap_err();
    assert!(matches!(err, CcsidError::MalformedSequence { pending: 3, .. }));

    let io: std::io::Error = err.into();
    assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
}

// =========================================================================
// Reader lifecycle
// =========================================================================

#[test]
fn test_closed_reader_fails() {
    let registry = TableRegistry::new();
    let mut reader = ConvTableReader::with_ccsid(&[0xC1, 0xC2][..], 37, &registry).unwrap();
    assert_eq!(reader.read_char().unwrap(), Some('A'));
    reader.close();
    assert!(matches!(reader.read_char(), Err(CcsidError::Closed)));
    assert!(matches!(reader.read_string(1), Err(CcsidError::Closed)));
    reader.close();
    assert!(reader.is_closed());
}

#[test]
fn test_with_encoding_name() {
    let registry = TableRegistry::new();
    let reader = ConvTableReader::with_encoding(&b""[..], "IBM-1047", &registry).unwrap();
    assert_eq!(reader.ccsid(), 1047);
    assert_eq!(reader.encoding(), "Cp1047");
}

#[test]
fn test_native_split_through_reader() {
    let registry = TableRegistry::new();
    let bytes = [0x93, 0xFA, 0x96, 0x7B];
    for cut in 0..=bytes.len() {
        let source = ChunkedSource::split(&bytes, &[cut]);
        let mut reader = ConvTableReader::new(source, table(&registry, 943));
        assert_eq!(read_all(&mut reader).unwrap(), "日本");
    }
}

// =========================================================================
// Registry
// =========================================================================

#[test]
fn test_registry_shared_across_threads() {
    let registry = Arc::new(TableRegistry::new());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let ccsid = if i % 2 == 0 { 37 } else { 1208 };
                registry.table(ccsid).unwrap()
            })
        })
        .collect();
    let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let cp037 = registry.table(37).unwrap();
    let utf8 = registry.table(1208).unwrap();
    for (i, t) in tables.iter().enumerate() {
        let expected = if i % 2 == 0 { &cp037 } else { &utf8 };
        assert!(Arc::ptr_eq(t, expected));
    }
    assert_eq!(registry.cached_count(), 2);
}

#[test]
fn test_end_to_end_cp037() {
    let registry = TableRegistry::new();
    let cp037 = registry.table(37).unwrap();
    assert_eq!(cp037.decode(&[0xC1]), "A");
    assert_eq!(cp037.encode("A").unwrap(), vec![0xC1]);
}
