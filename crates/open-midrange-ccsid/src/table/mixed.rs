//! Mixed-byte tables: single-byte text with shift-delimited double-byte runs.

use super::double::DbcsMap;
use super::single::SingleByteMap;

/// Shift-out: following bytes are double-byte pairs.
pub const SHIFT_OUT: u8 = 0x0E;
/// Shift-in: following bytes are single-byte characters.
pub const SHIFT_IN: u8 = 0x0F;

/// Single- and double-byte halves of a mixed code page.
#[derive(Debug, Clone)]
pub struct MixedByteMap {
    single: SingleByteMap,
    double: DbcsMap,
}

impl MixedByteMap {
    pub fn new(single: SingleByteMap, double: DbcsMap) -> Self {
        Self { single, double }
    }

    pub fn single(&self) -> &SingleByteMap {
        &self.single
    }

    pub fn double(&self) -> &DbcsMap {
        &self.double
    }

    pub fn shift_out(&self) -> u8 {
        SHIFT_OUT
    }

    pub fn shift_in(&self) -> u8 {
        SHIFT_IN
    }

    /// Encode text, preferring the single-byte half and wrapping double-byte
    /// runs in SO/SI.
    pub(crate) fn encode(&self, text: &str) -> Result<Vec<u8>, char> {
        let mut out = Vec::with_capacity(text.len() + 2);
        let mut in_double = false;
        for ch in text.chars() {
            let single = self
                .single
                .to_byte(ch)
                .filter(|&b| b != SHIFT_OUT && b != SHIFT_IN);
            if let Some(byte) = single {
                if in_double {
                    out.push(SHIFT_IN);
                    in_double = false;
                }
                out.push(byte);
            } else if let Some(pair) = self.double.to_pair(ch) {
                if !in_double {
                    out.push(SHIFT_OUT);
                    in_double = true;
                }
                out.extend_from_slice(&pair.to_be_bytes());
            } else {
                return Err(ch);
            }
        }
        if in_double {
            out.push(SHIFT_IN);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::data;

    fn korean() -> MixedByteMap {
        MixedByteMap::new(SingleByteMap::new(data::CCSID_833), DbcsMap::korean_host())
    }

    #[test]
    fn test_encode_single_only() {
        assert_eq!(korean().encode("AB").unwrap(), vec![0xC1, 0xC2]);
    }

    #[test]
    fn test_encode_wraps_double_run() {
        let bytes = korean().encode("AＡＢB").unwrap();
        assert_eq!(
            bytes,
            vec![0xC1, SHIFT_OUT, 0x42, 0xC1, 0x42, 0xC2, SHIFT_IN, 0xC2]
        );
    }

    #[test]
    fn test_encode_closes_trailing_run() {
        let bytes = korean().encode("\u{3000}").unwrap();
        assert_eq!(bytes, vec![SHIFT_OUT, 0x40, 0x40, SHIFT_IN]);
    }

    #[test]
    fn test_shift_controls_not_encodable() {
        assert_eq!(korean().encode("\u{000E}"), Err('\u{000E}'));
        assert_eq!(korean().encode("漢"), Err('漢'));
    }
}
