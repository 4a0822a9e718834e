//! Single-byte tables: one host byte per character.

use std::collections::HashMap;

use super::invert;

/// Character used by the host for unassigned single-byte positions.
pub const SUBSTITUTE: char = '\u{001A}';

/// Bidirectional single-byte map.
///
/// The inverse map is generated once from the forward table when the map is
/// built and never changes afterwards.
#[derive(Debug, Clone)]
pub struct SingleByteMap {
    to_unicode: Box<[char; 256]>,
    from_unicode: HashMap<char, u8>,
}

impl SingleByteMap {
    /// Build a map from a forward table indexed by host byte value.
    pub fn new(to_unicode: [char; 256]) -> Self {
        let from_unicode = invert(
            to_unicode
                .iter()
                .enumerate()
                .map(|(byte, &ch)| (byte as u8, ch)),
        );
        Self {
            to_unicode: Box::new(to_unicode),
            from_unicode,
        }
    }

    /// Build a map from a base table with some positions replaced.
    ///
    /// Used for the Euro-enabled variants, which differ from their base page
    /// only at 0x9F.
    pub fn with_overrides(base: &[char; 256], overrides: &[(u8, char)]) -> Self {
        let mut table = *base;
        for &(byte, ch) in overrides {
            table[byte as usize] = ch;
        }
        Self::new(table)
    }

    /// ISO-8859-1: every byte maps to the code point of the same value.
    pub fn latin1() -> Self {
        Self::new(std::array::from_fn(|i| char::from(i as u8)))
    }

    /// US-ASCII: the upper half is unassigned.
    pub fn ascii() -> Self {
        Self::new(std::array::from_fn(|i| {
            if i < 0x80 {
                char::from(i as u8)
            } else {
                SUBSTITUTE
            }
        }))
    }

    /// Character for a host byte.
    #[inline]
    pub fn to_char(&self, byte: u8) -> char {
        self.to_unicode[byte as usize]
    }

    /// Host byte for a character, if the table has one.
    #[inline]
    pub fn to_byte(&self, ch: char) -> Option<u8> {
        self.from_unicode.get(&ch).copied()
    }

    pub(crate) fn decode_into(&self, bytes: &[u8], out: &mut String) {
        out.reserve(bytes.len());
        out.extend(bytes.iter().map(|&b| self.to_char(b)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::data;

    #[test]
    fn test_cp037_letters() {
        let map = SingleByteMap::new(data::CCSID_37);
        assert_eq!(map.to_char(0xC1), 'A');
        assert_eq!(map.to_byte('A'), Some(0xC1));
        assert_eq!(map.to_byte('€'), None);
    }

    #[test]
    fn test_alias_lowest_byte_wins() {
        // 833 leaves many positions unassigned; they all read as SUB and the
        // first of them (0x3F) is the one SUB encodes back to.
        let map = SingleByteMap::new(data::CCSID_833);
        assert_eq!(map.to_char(0x41), SUBSTITUTE);
        assert_eq!(map.to_char(0x3F), SUBSTITUTE);
        assert_eq!(map.to_byte(SUBSTITUTE), Some(0x3F));
    }

    #[test]
    fn test_overrides() {
        let map = SingleByteMap::with_overrides(&data::CCSID_37, &[(0x9F, '€')]);
        assert_eq!(map.to_char(0x9F), '€');
        assert_eq!(map.to_byte('€'), Some(0x9F));
        // The replaced character is gone from the inverse.
        assert_eq!(map.to_byte('\u{00A4}'), None);
    }

    #[test]
    fn test_latin1_identity() {
        let map = SingleByteMap::latin1();
        for b in 0u8..=255 {
            assert_eq!(map.to_byte(map.to_char(b)), Some(b));
        }
    }

    #[test]
    fn test_ascii_upper_half_unassigned() {
        let map = SingleByteMap::ascii();
        assert_eq!(map.to_char(0x41), 'A');
        assert_eq!(map.to_char(0xC1), SUBSTITUTE);
        assert_eq!(map.to_byte(SUBSTITUTE), Some(0x1A));
        assert_eq!(map.to_byte('é'), None);
    }
}
