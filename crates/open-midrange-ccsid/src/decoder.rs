//! Stateful decoding across chunk boundaries.
//!
//! A [`Decoder`] owns the carry-over state for one byte stream: a half
//! double-byte pair, an unpaired high surrogate, the current shift mode of a
//! mixed-byte stream, or the first bytes of a UTF-8 sequence. Chunks can be
//! split at any byte position and still decode to the same text as the whole
//! stream decoded at once.

use std::sync::Arc;

use tracing::trace;

use crate::error::CcsidError;
use crate::table::{ConvTable, TableMap, REPLACEMENT, SHIFT_IN, SHIFT_OUT};
use crate::Result;

/// Shift state of a mixed-byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftMode {
    /// Bytes are single-byte characters.
    #[default]
    Single,
    /// Bytes are double-byte pairs (after SO, until SI).
    Double,
}

/// Per-category carry-over between chunks.
pub(crate) enum DecodeState {
    Single,
    Double {
        pending: Option<u8>,
        high_surrogate: Option<u16>,
    },
    Mixed {
        mode: ShiftMode,
        pending: Option<u8>,
    },
    Utf8 {
        leftover: [u8; 3],
        len: usize,
    },
    Native(encoding_rs::Decoder),
}

impl std::fmt::Debug for DecodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeState::Single => f.write_str("Single"),
            DecodeState::Double {
                pending,
                high_surrogate,
            } => f
                .debug_struct("Double")
                .field("pending", pending)
                .field("high_surrogate", high_surrogate)
                .finish(),
            DecodeState::Mixed { mode, pending } => f
                .debug_struct("Mixed")
                .field("mode", mode)
                .field("pending", pending)
                .finish(),
            DecodeState::Utf8 { leftover, len } => f
                .debug_struct("Utf8")
                .field("leftover", &&leftover[..*len])
                .finish(),
            DecodeState::Native(decoder) => f
                .debug_tuple("Native")
                .field(&decoder.encoding().name())
                .finish(),
        }
    }
}

impl DecodeState {
    pub(crate) fn new(map: &TableMap) -> Self {
        match map {
            TableMap::SingleByte(_) => DecodeState::Single,
            TableMap::DoubleByte(_) => DecodeState::Double {
                pending: None,
                high_surrogate: None,
            },
            TableMap::MixedByte(_) => DecodeState::Mixed {
                mode: ShiftMode::Single,
                pending: None,
            },
            TableMap::Utf8 => DecodeState::Utf8 {
                leftover: [0; 3],
                len: 0,
            },
            TableMap::Native(encoding) => {
                DecodeState::Native(encoding.new_decoder_without_bom_handling())
            }
        }
    }

    /// Number of input bytes held back for the next chunk.
    pub(crate) fn pending_len(&self) -> usize {
        match self {
            DecodeState::Single | DecodeState::Native(_) => 0,
            DecodeState::Double {
                pending,
                high_surrogate,
            } => usize::from(pending.is_some()) + 2 * usize::from(high_surrogate.is_some()),
            DecodeState::Mixed { pending, .. } => usize::from(pending.is_some()),
            DecodeState::Utf8 { len, .. } => *len,
        }
    }

    /// Decode one chunk, appending complete characters to `out`.
    pub(crate) fn decode(&mut self, map: &TableMap, bytes: &[u8], out: &mut String) {
        match (self, map) {
            (DecodeState::Single, TableMap::SingleByte(single)) => single.decode_into(bytes, out),
            (
                DecodeState::Double {
                    pending,
                    high_surrogate,
                },
                TableMap::DoubleByte(double),
            ) => {
                out.reserve(bytes.len() / 2);
                let mut rest = bytes;
                if let Some(first) = pending.take() {
                    match rest.split_first() {
                        Some((&second, tail)) => {
                            double.push_unit(u16::from_be_bytes([first, second]), high_surrogate, out);
                            rest = tail;
                        }
                        None => {
                            *pending = Some(first);
                            return;
                        }
                    }
                }
                let mut pairs = rest.chunks_exact(2);
                for pair in &mut pairs {
                    double.push_unit(u16::from_be_bytes([pair[0], pair[1]]), high_surrogate, out);
                }
                *pending = pairs.remainder().first().copied();
            }
            (DecodeState::Mixed { mode, pending }, TableMap::MixedByte(mixed)) => {
                out.reserve(bytes.len());
                for &byte in bytes {
                    match *mode {
                        ShiftMode::Single => match byte {
                            SHIFT_OUT => *mode = ShiftMode::Double,
                            // Stray SI in single mode carries no text.
                            SHIFT_IN => {}
                            _ => out.push(mixed.single().to_char(byte)),
                        },
                        ShiftMode::Double => match pending.take() {
                            // Shift bytes never occur inside a pair: the run was cut short.
                            Some(_) if byte == SHIFT_IN || byte == SHIFT_OUT => {
                                out.push(REPLACEMENT);
                                if byte == SHIFT_IN {
                                    *mode = ShiftMode::Single;
                                }
                            }
                            Some(first) => {
                                let pair = u16::from_be_bytes([first, byte]);
                                out.push(mixed.double().to_char(pair).unwrap_or(REPLACEMENT));
                            }
                            None => match byte {
                                SHIFT_IN => *mode = ShiftMode::Single,
                                SHIFT_OUT => {}
                                _ => *pending = Some(byte),
                            },
                        },
                    }
                }
            }
            (DecodeState::Utf8 { leftover, len }, TableMap::Utf8) => {
                decode_utf8(leftover, len, bytes, out);
            }
            (DecodeState::Native(decoder), TableMap::Native(_)) => {
                if let Some(needed) = decoder.max_utf8_buffer_length(bytes.len()) {
                    out.reserve(needed);
                }
                let (_, read, _) = decoder.decode_to_string(bytes, out, false);
                debug_assert_eq!(read, bytes.len());
            }
            (state, _) => unreachable!("decode state {:?} does not match its table", state),
        }
    }

    /// End of stream: fail if a sequence is incomplete, otherwise reset.
    pub(crate) fn finish(&mut self, map: &TableMap, ccsid: u16, out: &mut String) -> Result<()> {
        let pending = self.pending_len();
        if let DecodeState::Native(decoder) = self {
            let mut tail = String::new();
            if let Some(needed) = decoder.max_utf8_buffer_length(0) {
                tail.reserve(needed);
            }
            let (_, _, had_errors) = decoder.decode_to_string(&[], &mut tail, true);
            *self = DecodeState::new(map);
            if had_errors {
                return Err(CcsidError::MalformedSequence { ccsid, pending: 1 });
            }
            out.push_str(&tail);
            return Ok(());
        }

        // A mixed stream that ends in double mode on a pair boundary is
        // treated as if SI had been sent.
        let result = if pending > 0 {
            Err(CcsidError::MalformedSequence { ccsid, pending })
        } else {
            Ok(())
        };
        *self = DecodeState::new(map);
        result
    }

    /// End of a whole-buffer decode: flush anything incomplete as U+FFFD.
    pub(crate) fn flush_lossy(&mut self, map: &TableMap, out: &mut String) {
        match self {
            DecodeState::Native(decoder) => {
                if let Some(needed) = decoder.max_utf8_buffer_length(0) {
                    out.reserve(needed);
                }
                let _ = decoder.decode_to_string(&[], out, true);
            }
            _ => {
                if self.pending_len() > 0 {
                    out.push(REPLACEMENT);
                }
            }
        }
        *self = DecodeState::new(map);
    }

    fn mode(&self) -> Option<ShiftMode> {
        match self {
            DecodeState::Mixed { mode, .. } => Some(*mode),
            _ => None,
        }
    }
}

/// Expected length of a UTF-8 sequence from its lead byte; `None` for bytes
/// that can never start a sequence.
fn utf8_sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Strict UTF-8 decode of `leftover[..len] ++ bytes`.
///
/// Invalid sequences become one U+FFFD per offending byte; a well-formed but
/// incomplete tail is kept in `leftover` for the next chunk.
fn decode_utf8(leftover: &mut [u8; 3], len: &mut usize, bytes: &[u8], out: &mut String) {
    let joined;
    let input: &[u8] = if *len > 0 {
        let mut buf = Vec::with_capacity(*len + bytes.len());
        buf.extend_from_slice(&leftover[..*len]);
        buf.extend_from_slice(bytes);
        joined = buf;
        &joined
    } else {
        bytes
    };
    *len = 0;
    out.reserve(input.len());

    let mut pos = 0;
    while pos < input.len() {
        match std::str::from_utf8(&input[pos..]) {
            Ok(valid) => {
                out.push_str(valid);
                return;
            }
            Err(err) => {
                let good = err.valid_up_to();
                // valid_up_to always lands on a char boundary.
                if let Ok(valid) = std::str::from_utf8(&input[pos..pos + good]) {
                    out.push_str(valid);
                }
                pos += good;
                match err.error_len() {
                    Some(bad) => {
                        for _ in 0..bad {
                            out.push(REPLACEMENT);
                        }
                        pos += bad;
                    }
                    None => {
                        let tail = &input[pos..];
                        let complete_prefix = tail.len() < 4
                            && utf8_sequence_len(tail[0]).is_some_and(|need| need > tail.len())
                            && tail[1..].iter().all(|&b| is_continuation(b));
                        if complete_prefix {
                            leftover[..tail.len()].copy_from_slice(tail);
                            *len = tail.len();
                        } else {
                            for _ in tail {
                                out.push(REPLACEMENT);
                            }
                        }
                        return;
                    }
                }
            }
        }
    }
}

/// Stateful decoder for one byte stream in one CCSID.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use open_midrange_ccsid::{ConvTable, Decoder};
///
/// let table = Arc::new(ConvTable::bundled(13488).unwrap());
/// let mut decoder = Decoder::new(table);
/// let mut text = String::new();
/// decoder.decode_chunk(&[0x00, 0x48, 0x00], &mut text);
/// decoder.decode_chunk(&[0x49], &mut text);
/// decoder.finish(&mut text).unwrap();
/// assert_eq!(text, "HI");
/// ```
#[derive(Debug)]
pub struct Decoder {
    table: Arc<ConvTable>,
    state: DecodeState,
}

impl Decoder {
    pub fn new(table: Arc<ConvTable>) -> Self {
        let state = DecodeState::new(table.map());
        Self { table, state }
    }

    pub fn table(&self) -> &Arc<ConvTable> {
        &self.table
    }

    /// Decode a chunk, appending every complete character to `out`.
    ///
    /// Bytes that do not yet form a complete character are held until the
    /// next call.
    pub fn decode_chunk(&mut self, bytes: &[u8], out: &mut String) {
        let before = out.len();
        self.state.decode(self.table.map(), bytes, out);
        trace!(
            ccsid = self.table.ccsid(),
            bytes = bytes.len(),
            produced = out.len() - before,
            pending = self.state.pending_len(),
            "Decoded chunk"
        );
    }

    /// Signal end of stream.
    ///
    /// # Errors
    /// Returns `CcsidError::MalformedSequence` if bytes of an incomplete
    /// sequence are still held. The decoder is reset either way.
    pub fn finish(&mut self, out: &mut String) -> Result<()> {
        self.state.finish(self.table.map(), self.table.ccsid(), out)
    }

    /// Bytes currently held for an incomplete sequence.
    pub fn pending_len(&self) -> usize {
        self.state.pending_len()
    }

    /// Current shift mode (mixed-byte tables only).
    pub fn shift_mode(&self) -> Option<ShiftMode> {
        self.state.mode()
    }

    /// Drop all carry-over state.
    pub fn reset(&mut self) {
        self.state = DecodeState::new(self.table.map());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(ccsid: u16) -> Decoder {
        Decoder::new(Arc::new(ConvTable::bundled(ccsid).unwrap()))
    }

    fn decode_in_pieces(ccsid: u16, bytes: &[u8], split: usize) -> Result<String> {
        let mut d = decoder(ccsid);
        let mut out = String::new();
        d.decode_chunk(&bytes[..split], &mut out);
        d.decode_chunk(&bytes[split..], &mut out);
        d.finish(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_single_byte_has_no_state() {
        let mut d = decoder(37);
        let mut out = String::new();
        d.decode_chunk(&[0xC8, 0xC9], &mut out);
        assert_eq!(d.pending_len(), 0);
        d.finish(&mut out).unwrap();
        assert_eq!(out, "HI");
        assert_eq!(d.shift_mode(), None);
    }

    #[test]
    fn test_double_byte_odd_split() {
        let bytes = [0x00, 0x48, 0x00, 0x49, 0x00, 0x21];
        for split in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(13488, &bytes, split).unwrap(), "HI!");
        }
    }

    #[test]
    fn test_double_byte_one_byte_at_a_time() {
        let mut d = decoder(13488);
        let mut out = String::new();
        d.decode_chunk(&[0x00], &mut out);
        assert_eq!(d.pending_len(), 1);
        d.decode_chunk(&[], &mut out);
        assert_eq!(d.pending_len(), 1);
        d.decode_chunk(&[0x41], &mut out);
        assert_eq!(out, "A");
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn test_utf16_surrogate_across_chunks() {
        let bytes = [0xD8, 0x3D, 0xDE, 0x00];
        for split in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(1200, &bytes, split).unwrap(), "😀");
        }
    }

    #[test]
    fn test_double_byte_eof_mid_pair() {
        let err = decode_in_pieces(13488, &[0x00, 0x41, 0x00], 3).unwrap_err();
        assert!(matches!(
            err,
            CcsidError::MalformedSequence { ccsid: 13488, pending: 1 }
        ));
    }

    #[test]
    fn test_mixed_shift_state_carries() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[0xC1, SHIFT_OUT], &mut out);
        assert_eq!(d.shift_mode(), Some(ShiftMode::Double));
        d.decode_chunk(&[0x42], &mut out);
        assert_eq!(d.pending_len(), 1);
        d.decode_chunk(&[0xC1, SHIFT_IN, 0xC2], &mut out);
        assert_eq!(d.shift_mode(), Some(ShiftMode::Single));
        d.finish(&mut out).unwrap();
        assert_eq!(out, "AＡB");
    }

    #[test]
    fn test_mixed_implicit_shift_in_at_eof() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[SHIFT_OUT, 0x40, 0x40], &mut out);
        d.finish(&mut out).unwrap();
        assert_eq!(out, "\u{3000}");
        assert_eq!(d.shift_mode(), Some(ShiftMode::Single));
    }

    #[test]
    fn test_mixed_eof_mid_pair_fails() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[SHIFT_OUT, 0x40], &mut out);
        assert!(d.finish(&mut out).is_err());
    }

    #[test]
    fn test_mixed_stray_shifts_ignored() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[SHIFT_IN, 0xC1, SHIFT_OUT, SHIFT_OUT, 0x40, 0x40, SHIFT_IN], &mut out);
        d.finish(&mut out).unwrap();
        assert_eq!(out, "A\u{3000}");
    }

    #[test]
    fn test_mixed_shift_in_mid_pair_recovers() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[SHIFT_OUT, 0x42, SHIFT_IN, 0xC1, 0xC2], &mut out);
        assert_eq!(d.shift_mode(), Some(ShiftMode::Single));
        d.finish(&mut out).unwrap();
        assert_eq!(out, "\u{FFFD}AB");
    }

    #[test]
    fn test_mixed_shift_in_mid_pair_across_chunks() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[SHIFT_OUT, 0x42], &mut out);
        d.decode_chunk(&[SHIFT_IN, 0xC1], &mut out);
        d.finish(&mut out).unwrap();
        assert_eq!(out, "\u{FFFD}A");
    }

    #[test]
    fn test_mixed_shift_out_mid_pair_stays_double() {
        let mut d = decoder(933);
        let mut out = String::new();
        d.decode_chunk(&[SHIFT_OUT, 0x42, SHIFT_OUT, 0x40, 0x40, SHIFT_IN], &mut out);
        d.finish(&mut out).unwrap();
        assert_eq!(out, "\u{FFFD}\u{3000}");
    }

    #[test]
    fn test_lossy_flush_of_dangling_bytes() {
        let map = TableMap::DoubleByte(crate::table::DoubleByteMap::Ucs2);
        let mut state = DecodeState::new(&map);
        let mut out = String::new();
        state.decode(&map, &[0x00, 0x41, 0x00], &mut out);
        state.flush_lossy(&map, &mut out);
        assert_eq!(out, "A\u{FFFD}");
        assert_eq!(state.pending_len(), 0);

        let cp933 = ConvTable::bundled(933).unwrap();
        assert_eq!(cp933.decode(&[SHIFT_OUT, 0x42, SHIFT_IN, 0xC1, 0xC2]), "\u{FFFD}AB");
    }

    #[test]
    fn test_utf8_split_everywhere() {
        let text = "a€😀é";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(1208, bytes, split).unwrap(), text);
        }
    }

    #[test]
    fn test_utf8_invalid_bytes_replaced() {
        let mut d = decoder(1208);
        let mut out = String::new();
        d.decode_chunk(&[0x41, 0xFF, 0x42, 0x80], &mut out);
        d.finish(&mut out).unwrap();
        assert_eq!(out, "A\u{FFFD}B\u{FFFD}");
    }

    #[test]
    fn test_utf8_eof_mid_sequence() {
        let mut d = decoder(1208);
        let mut out = String::new();
        d.decode_chunk(&[0xF0, 0x9F], &mut out);
        assert_eq!(d.pending_len(), 2);
        let err = d.finish(&mut out).unwrap_err();
        assert!(matches!(err, CcsidError::MalformedSequence { pending: 2, .. }));
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn test_native_multibyte_split() {
        let bytes = [0x93, 0xFA, 0x96, 0x7B];
        for split in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(943, &bytes, split).unwrap(), "日本");
        }
    }

    #[test]
    fn test_native_eof_mid_sequence() {
        let mut d = decoder(943);
        let mut out = String::new();
        d.decode_chunk(&[0x93], &mut out);
        assert!(d.finish(&mut out).is_err());
    }

    #[test]
    fn test_reset_drops_state() {
        let mut d = decoder(13488);
        let mut out = String::new();
        d.decode_chunk(&[0x00], &mut out);
        d.reset();
        assert_eq!(d.pending_len(), 0);
        d.finish(&mut out).unwrap();
    }
}
