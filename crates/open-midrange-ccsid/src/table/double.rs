//! Double-byte tables: every character is a big-endian byte pair.

use std::collections::HashMap;

use super::{invert, REPLACEMENT};

/// Ideographic space shared by the host DBCS code pages.
const DBCS_SPACE: u16 = 0x4040;

/// Row of the host DBCS pages holding full-width forms of the single-byte
/// EBCDIC letters and digits.
const FULL_WIDTH_ROW: u8 = 0x42;

/// Sparse host DBCS map (byte pair to character and back).
#[derive(Debug, Clone)]
pub struct DbcsMap {
    to_unicode: HashMap<u16, char>,
    from_unicode: HashMap<char, u16>,
}

impl DbcsMap {
    /// Build a map from `(pair, char)` entries.
    ///
    /// Entries are sorted by pair value before the inverse is generated, so
    /// aliased characters encode to their lowest pair.
    pub fn new(entries: impl IntoIterator<Item = (u16, char)>) -> Self {
        let mut entries: Vec<(u16, char)> = entries.into_iter().collect();
        entries.sort_by_key(|&(pair, _)| pair);
        let from_unicode = invert(entries.iter().copied());
        let to_unicode = entries.into_iter().collect();
        Self {
            to_unicode,
            from_unicode,
        }
    }

    /// Korean host DBCS (CCSID 834), bundled subset.
    ///
    /// Carries the ideographic space and the full-width row 0x42, whose
    /// second byte follows the single-byte EBCDIC positions of the Latin
    /// letters and digits.
    pub fn korean_host() -> Self {
        let mut entries = vec![(DBCS_SPACE, '\u{3000}')];
        let ranges: [(u8, u8, char); 7] = [
            (0x81, 0x89, 'a'),
            (0x91, 0x99, 'j'),
            (0xA2, 0xA9, 's'),
            (0xC1, 0xC9, 'A'),
            (0xD1, 0xD9, 'J'),
            (0xE2, 0xE9, 'S'),
            (0xF0, 0xF9, '0'),
        ];
        for (first, last, base) in ranges {
            for (offset, second) in (first..=last).enumerate() {
                let ascii = u32::from(base) + offset as u32;
                // U+FF01..U+FF5E are the full-width forms of U+0021..U+007E.
                if let Some(ch) = char::from_u32(ascii - 0x21 + 0xFF01) {
                    entries.push((u16::from_be_bytes([FULL_WIDTH_ROW, second]), ch));
                }
            }
        }
        Self::new(entries)
    }

    /// Character for a byte pair, if the pair is assigned.
    #[inline]
    pub fn to_char(&self, pair: u16) -> Option<char> {
        self.to_unicode.get(&pair).copied()
    }

    /// Byte pair for a character, if the table has one.
    #[inline]
    pub fn to_pair(&self, ch: char) -> Option<u16> {
        self.from_unicode.get(&ch).copied()
    }

    /// Number of assigned pairs.
    pub fn len(&self) -> usize {
        self.to_unicode.len()
    }

    /// Whether the map has no assigned pairs.
    pub fn is_empty(&self) -> bool {
        self.to_unicode.is_empty()
    }
}

/// Double-byte table flavours.
#[derive(Debug, Clone)]
pub enum DoubleByteMap {
    /// UCS-2 big-endian (CCSID 13488). Surrogate code units are invalid.
    Ucs2,
    /// UTF-16 big-endian (CCSID 1200). Surrogate pairs form one character.
    Utf16,
    /// Table-driven host DBCS.
    Host(DbcsMap),
}

impl DoubleByteMap {
    /// Decode one code unit, folding UTF-16 surrogate pairs through
    /// `high_surrogate`.
    pub(crate) fn push_unit(&self, unit: u16, high_surrogate: &mut Option<u16>, out: &mut String) {
        match self {
            DoubleByteMap::Ucs2 => {
                out.push(char::from_u32(u32::from(unit)).unwrap_or(REPLACEMENT));
            }
            DoubleByteMap::Utf16 => {
                if let Some(high) = high_surrogate.take() {
                    if is_low_surrogate(unit) {
                        let scalar = 0x10000
                            + ((u32::from(high) - 0xD800) << 10)
                            + (u32::from(unit) - 0xDC00);
                        out.push(char::from_u32(scalar).unwrap_or(REPLACEMENT));
                        return;
                    }
                    out.push(REPLACEMENT);
                }
                if is_high_surrogate(unit) {
                    *high_surrogate = Some(unit);
                } else {
                    out.push(char::from_u32(u32::from(unit)).unwrap_or(REPLACEMENT));
                }
            }
            DoubleByteMap::Host(map) => out.push(map.to_char(unit).unwrap_or(REPLACEMENT)),
        }
    }

    /// Encode text, returning the first character with no representation.
    pub(crate) fn encode(&self, text: &str) -> Result<Vec<u8>, char> {
        let mut out = Vec::with_capacity(text.len() * 2);
        match self {
            DoubleByteMap::Ucs2 => {
                for ch in text.chars() {
                    let unit = u16::try_from(u32::from(ch)).map_err(|_| ch)?;
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            DoubleByteMap::Utf16 => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            DoubleByteMap::Host(map) => {
                for ch in text.chars() {
                    let pair = map.to_pair(ch).ok_or(ch)?;
                    out.extend_from_slice(&pair.to_be_bytes());
                }
            }
        }
        Ok(out)
    }
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}
