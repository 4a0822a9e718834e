//! Code-page tables for host CCSIDs.
//!
//! A [`ConvTable`] is an immutable bidirectional mapping between one CCSID
//! and Unicode. The mapping is a tagged [`TableMap`] over the table
//! categories the host uses:
//!
//! - **Single-byte**: EBCDIC pages (37, 500, 1047, 1140, 1148, 1164, 833, 425)
//!   and ASCII pages (819, 367)
//! - **Double-byte**: UCS-2 (13488), UTF-16 (1200), host DBCS (834)
//! - **Mixed-byte**: SO/SI-shifted single/double pages (933)
//! - **UTF-8**: CCSID 1208
//! - **Native**: PC code pages handled by `encoding_rs` (1250-1258, 874, 912,
//!   923, 943, 1386)
//!
//! Inverse tables are generated once, when the table is built, by walking
//! the forward table in ascending byte order. Where several byte values
//! alias the same character the lowest one wins.

pub(crate) mod data;
pub mod double;
pub mod mixed;
pub mod single;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use encoding_rs::{EncoderResult, Encoding};
use serde::{Deserialize, Serialize};

pub use double::{DbcsMap, DoubleByteMap};
pub use mixed::{MixedByteMap, SHIFT_IN, SHIFT_OUT};
pub use single::{SingleByteMap, SUBSTITUTE};

use crate::decoder::{DecodeState, Decoder};
use crate::error::CcsidError;
use crate::registry::encoding_for_ccsid;
use crate::Result;

/// Character produced for undecodable multi-byte input.
pub const REPLACEMENT: char = '\u{FFFD}';

/// Category tag of a table; selects the decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableCategory {
    SingleByte,
    DoubleByte,
    MixedByte,
    Utf8,
    Native,
}

impl std::fmt::Display for TableCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableCategory::SingleByte => write!(f, "single-byte"),
            TableCategory::DoubleByte => write!(f, "double-byte"),
            TableCategory::MixedByte => write!(f, "mixed-byte"),
            TableCategory::Utf8 => write!(f, "utf-8"),
            TableCategory::Native => write!(f, "native"),
        }
    }
}

/// Category-specific lookup data.
#[derive(Debug, Clone)]
pub enum TableMap {
    SingleByte(SingleByteMap),
    DoubleByte(DoubleByteMap),
    MixedByte(MixedByteMap),
    Utf8,
    Native(&'static Encoding),
}

/// Conversion table for one CCSID.
#[derive(Debug, Clone)]
pub struct ConvTable {
    ccsid: u16,
    encoding: &'static str,
    map: TableMap,
}

impl ConvTable {
    /// Create a table from its parts.
    pub fn new(ccsid: u16, encoding: &'static str, map: TableMap) -> Self {
        Self {
            ccsid,
            encoding,
            map,
        }
    }

    /// Build one of the bundled tables.
    ///
    /// # Errors
    /// Returns `CcsidError::UnsupportedCcsid` if no table is bundled for `ccsid`.
    pub fn bundled(ccsid: u16) -> Result<Self> {
        let encoding = encoding_for_ccsid(ccsid).ok_or(CcsidError::UnsupportedCcsid(ccsid))?;
        let map = match ccsid {
            37 => TableMap::SingleByte(SingleByteMap::new(data::CCSID_37)),
            500 => TableMap::SingleByte(SingleByteMap::new(data::CCSID_500)),
            1047 => TableMap::SingleByte(SingleByteMap::new(data::CCSID_1047)),
            425 => TableMap::SingleByte(SingleByteMap::new(data::CCSID_425)),
            833 => TableMap::SingleByte(SingleByteMap::new(data::CCSID_833)),
            1164 => TableMap::SingleByte(SingleByteMap::new(data::CCSID_1164)),
            1140 => TableMap::SingleByte(SingleByteMap::with_overrides(
                &data::CCSID_37,
                &[(0x9F, '€')],
            )),
            1148 => TableMap::SingleByte(SingleByteMap::with_overrides(
                &data::CCSID_500,
                &[(0x9F, '€')],
            )),
            819 => TableMap::SingleByte(SingleByteMap::latin1()),
            367 => TableMap::SingleByte(SingleByteMap::ascii()),
            13488 => TableMap::DoubleByte(DoubleByteMap::Ucs2),
            1200 => TableMap::DoubleByte(DoubleByteMap::Utf16),
            834 => TableMap::DoubleByte(DoubleByteMap::Host(DbcsMap::korean_host())),
            933 => TableMap::MixedByte(MixedByteMap::new(
                SingleByteMap::new(data::CCSID_833),
                DbcsMap::korean_host(),
            )),
            1208 => TableMap::Utf8,
            _ => TableMap::Native(native_encoding(ccsid).ok_or(CcsidError::UnsupportedCcsid(ccsid))?),
        };
        Ok(Self::new(ccsid, encoding, map))
    }

    pub fn ccsid(&self) -> u16 {
        self.ccsid
    }

    /// Canonical encoding name for this CCSID.
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    pub fn map(&self) -> &TableMap {
        &self.map
    }

    pub fn category(&self) -> TableCategory {
        match self.map {
            TableMap::SingleByte(_) => TableCategory::SingleByte,
            TableMap::DoubleByte(_) => TableCategory::DoubleByte,
            TableMap::MixedByte(_) => TableCategory::MixedByte,
            TableMap::Utf8 => TableCategory::Utf8,
            TableMap::Native(_) => TableCategory::Native,
        }
    }

    /// Decode a complete byte sequence.
    ///
    /// Never fails: unassigned input decodes to the table's substitute or to
    /// U+FFFD, and a sequence cut off at the end of `bytes` decodes to U+FFFD.
    /// Use a [`Decoder`](crate::Decoder) when input arrives in pieces.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        let mut state = DecodeState::new(&self.map);
        state.decode(&self.map, bytes, &mut out);
        state.flush_lossy(&self.map, &mut out);
        out
    }

    /// Streaming decoder over this table.
    pub fn decoder(self: &Arc<Self>) -> Decoder {
        Decoder::new(Arc::clone(self))
    }

    /// Decode `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns `CcsidError::InvalidRange` if the range is outside `bytes`.
    pub fn decode_range(&self, bytes: &[u8], offset: usize, length: usize) -> Result<String> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= bytes.len())
            .ok_or(CcsidError::InvalidRange {
                offset,
                length,
                len: bytes.len(),
            })?;
        Ok(self.decode(&bytes[offset..end]))
    }

    /// Encode text into host bytes.
    ///
    /// # Errors
    /// Returns `CcsidError::ConversionMismatch` for the first character the
    /// table cannot represent. Nothing is substituted.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let encoded = match &self.map {
            TableMap::SingleByte(map) => text
                .chars()
                .map(|ch| map.to_byte(ch).ok_or(ch))
                .collect::<std::result::Result<Vec<u8>, char>>(),
            TableMap::DoubleByte(map) => map.encode(text),
            TableMap::MixedByte(map) => map.encode(text),
            TableMap::Utf8 => Ok(text.as_bytes().to_vec()),
            TableMap::Native(encoding) => encode_native(encoding, text),
        };
        encoded.map_err(|ch| CcsidError::ConversionMismatch {
            ch,
            ccsid: self.ccsid,
        })
    }

    /// Character for one host byte (single-byte tables only).
    pub fn char_for_byte(&self, byte: u8) -> Option<char> {
        match &self.map {
            TableMap::SingleByte(map) => Some(map.to_char(byte)),
            _ => None,
        }
    }

    /// Host byte for one character (single-byte tables only).
    pub fn byte_for_char(&self, ch: char) -> Option<u8> {
        match &self.map {
            TableMap::SingleByte(map) => map.to_byte(ch),
            _ => None,
        }
    }
}

/// Invert a forward mapping; the first occurrence of a character wins.
pub(crate) fn invert<K: Copy + Eq + Hash>(forward: impl Iterator<Item = (K, char)>) -> HashMap<char, K> {
    let mut inverse = HashMap::new();
    for (key, ch) in forward {
        inverse.entry(ch).or_insert(key);
    }
    inverse
}

/// PC code pages delegated to `encoding_rs`.
pub(crate) fn native_encoding(ccsid: u16) -> Option<&'static Encoding> {
    let encoding = match ccsid {
        874 => encoding_rs::WINDOWS_874,
        912 => encoding_rs::ISO_8859_2,
        923 => encoding_rs::ISO_8859_15,
        943 => encoding_rs::SHIFT_JIS,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 => encoding_rs::WINDOWS_1252,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        1386 => encoding_rs::GBK,
        _ => return None,
    };
    Some(encoding)
}

fn encode_native(encoding: &'static Encoding, text: &str) -> std::result::Result<Vec<u8>, char> {
    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(text.len())
        .unwrap_or(text.len());
    let mut out = Vec::with_capacity(capacity);
    let mut remaining = text;
    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(remaining, &mut out, true);
        remaining = &remaining[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(out),
            EncoderResult::Unmappable(ch) => return Err(ch),
            EncoderResult::OutputFull => out.reserve(remaining.len() * 2 + 16),
        }
    }
}
