//! Error types for CCSID conversion and stateful decoding.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while converting host text.
#[derive(Debug, Error, Diagnostic)]
pub enum CcsidError {
    /// No table is bundled for the requested CCSID.
    #[error("CCSID {0} is not supported")]
    #[diagnostic(code(ccsid::unsupported_ccsid))]
    UnsupportedCcsid(u16),

    /// No table is bundled for the requested encoding name.
    #[error("encoding '{0}' is not supported")]
    #[diagnostic(code(ccsid::unsupported_encoding))]
    UnsupportedEncoding(String),

    /// A character has no byte representation in the target table.
    #[error("character '{ch}' (U+{:04X}) cannot be encoded in CCSID {ccsid}", code_point(.ch))]
    #[diagnostic(code(ccsid::conversion_mismatch))]
    ConversionMismatch { ch: char, ccsid: u16 },

    /// The byte stream ended in the middle of a multi-byte sequence.
    #[error("CCSID {ccsid} stream ended with {pending} byte(s) of an incomplete sequence")]
    #[diagnostic(code(ccsid::malformed_sequence))]
    MalformedSequence { ccsid: u16, pending: usize },

    /// A byte range falls outside the supplied buffer.
    #[error("range of {length} byte(s) at offset {offset} is outside a buffer of {len} bytes")]
    #[diagnostic(code(ccsid::invalid_range))]
    InvalidRange {
        offset: usize,
        length: usize,
        len: usize,
    },

    /// Reader character cache must hold at least one character.
    #[error("invalid cache size {0}: must be greater than zero")]
    #[diagnostic(code(ccsid::invalid_cache_size))]
    InvalidCacheSize(usize),

    /// The reader was closed before this call.
    #[error("reader is closed")]
    #[diagnostic(code(ccsid::closed))]
    Closed,

    /// I/O error from the underlying byte source.
    #[error("I/O error: {0}")]
    #[diagnostic(code(ccsid::io))]
    Io(#[from] std::io::Error),
}

fn code_point(ch: &char) -> u32 {
    u32::from(*ch)
}

impl From<CcsidError> for std::io::Error {
    fn from(err: CcsidError) -> Self {
        use std::io::ErrorKind;
        match err {
            CcsidError::Io(e) => e,
            CcsidError::MalformedSequence { .. } => std::io::Error::new(ErrorKind::InvalidData, err),
            CcsidError::Closed => std::io::Error::new(ErrorKind::BrokenPipe, err),
            other => std::io::Error::new(ErrorKind::Other, other),
        }
    }
}
