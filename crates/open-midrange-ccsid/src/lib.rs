//! CCSID code-page conversion for OpenMidrange.
//!
//! This crate converts text between Unicode and the character sets a
//! midrange host publishes as CCSIDs, and decodes host byte streams
//! incrementally.
//!
//! # Features
//!
//! - **Code-Page Tables**: single-byte EBCDIC and ASCII, double-byte
//!   (UCS-2, UTF-16, host DBCS), SO/SI mixed-byte, UTF-8, and PC code pages
//! - **Table Registry**: lazy, shared construction keyed by CCSID or name
//! - **Stateful Decoding**: partial multi-byte sequences and shift state
//!   survive arbitrary chunk boundaries
//! - **Reader**: cached character reader over any `std::io::Read`
//!
//! # Example
//!
//! ```rust
//! use open_midrange_ccsid::{ConvTableReader, TableRegistry};
//!
//! let registry = TableRegistry::new();
//!
//! // One-shot conversion
//! let cp037 = registry.table(37).unwrap();
//! let ebcdic = cp037.encode("HELLO").unwrap();
//! assert_eq!(cp037.decode(&ebcdic), "HELLO");
//!
//! // Streaming: a UTF-16 character split across reads
//! let mut reader = ConvTableReader::with_ccsid(&[0xD8, 0x3D, 0xDE, 0x00][..], 1200, &registry).unwrap();
//! assert_eq!(reader.read_char().unwrap(), Some('😀'));
//! ```

pub mod decoder;
pub mod error;
pub mod reader;
pub mod registry;
pub mod table;

// Re-export commonly used types at crate root
pub use decoder::{Decoder, ShiftMode};
pub use error::CcsidError;
pub use reader::{Chars, ConvTableReader, ReaderOptions, DEFAULT_CACHE_SIZE};
pub use registry::{ccsid_for_encoding, encoding_for_ccsid, TableRegistry};
pub use table::{
    ConvTable, DbcsMap, DoubleByteMap, MixedByteMap, SingleByteMap, TableCategory, TableMap,
    REPLACEMENT, SHIFT_IN, SHIFT_OUT, SUBSTITUTE,
};

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, CcsidError>;
