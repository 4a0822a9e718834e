//! Character reader over a host byte stream.
//!
//! [`ConvTableReader`] pulls bytes from any [`Read`] source into a bounded
//! byte cache, decodes each refill through a [`Decoder`], and serves
//! characters out of a bounded character cache. Multi-byte sequences split
//! across refills are carried by the decoder, so the characters produced do
//! not depend on how the source delivers its bytes.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::decoder::Decoder;
use crate::error::CcsidError;
use crate::registry::TableRegistry;
use crate::table::{ConvTable, TableCategory};
use crate::Result;

/// Default number of characters decoded per refill.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

/// Reader tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Characters decoded per refill. Must be at least 1.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Byte cache capacity for a character cache of `cache_size`.
///
/// Mixed-byte streams need room for shift bytes around double-byte runs.
fn byte_cache_len(category: TableCategory, cache_size: usize) -> usize {
    match category {
        TableCategory::MixedByte => (cache_size * 5 + 3) / 2,
        _ => cache_size,
    }
}

/// Decoding reader over a byte source.
///
/// Reads return `Ok(None)` at end of stream. After [`close`](Self::close)
/// every read fails with `CcsidError::Closed`.
///
/// # Example
///
/// ```
/// use open_midrange_ccsid::{ConvTableReader, TableRegistry};
///
/// let registry = TableRegistry::new();
/// let bytes: &[u8] = &[0xC8, 0xC5, 0xD3, 0xD3, 0xD6];
/// let mut reader = ConvTableReader::with_ccsid(bytes, 37, &registry).unwrap();
/// assert_eq!(reader.read_string(16).unwrap().as_deref(), Some("HELLO"));
/// assert_eq!(reader.read_char().unwrap(), None);
/// ```
pub struct ConvTableReader<R: Read> {
    /// Byte cache: the buffer of this reader, sized by `byte_cache_len`.
    source: Option<BufReader<R>>,
    decoder: Decoder,
    cache: Vec<char>,
    next_read: usize,
    cache_size: usize,
    eof: bool,
}

impl<R: Read> ConvTableReader<R> {
    /// Reader with the default cache size.
    pub fn new(source: R, table: Arc<ConvTable>) -> Self {
        let cache_size = DEFAULT_CACHE_SIZE;
        let byte_len = byte_cache_len(table.category(), cache_size);
        Self::build(source, table, cache_size, byte_len)
    }

    /// Reader with explicit options.
    ///
    /// # Errors
    /// Returns `CcsidError::InvalidCacheSize` if `options.cache_size` is zero.
    pub fn with_options(source: R, table: Arc<ConvTable>, options: &ReaderOptions) -> Result<Self> {
        if options.cache_size == 0 {
            return Err(CcsidError::InvalidCacheSize(options.cache_size));
        }
        let byte_len = byte_cache_len(table.category(), options.cache_size);
        Ok(Self::build(source, table, options.cache_size, byte_len))
    }

    /// Reader for a CCSID resolved through `registry`.
    ///
    /// # Errors
    /// Returns `CcsidError::UnsupportedCcsid` if no table is bundled.
    pub fn with_ccsid(source: R, ccsid: u16, registry: &TableRegistry) -> Result<Self> {
        Ok(Self::new(source, registry.table(ccsid)?))
    }

    /// Reader for an encoding name resolved through `registry`.
    ///
    /// # Errors
    /// Returns `CcsidError::UnsupportedEncoding` if the name is not recognized.
    pub fn with_encoding(source: R, name: &str, registry: &TableRegistry) -> Result<Self> {
        Ok(Self::new(source, registry.table_by_name(name)?))
    }

    fn build(source: R, table: Arc<ConvTable>, cache_size: usize, byte_len: usize) -> Self {
        debug!(
            ccsid = table.ccsid(),
            category = %table.category(),
            cache_size,
            byte_cache_size = byte_len,
            "Opened reader"
        );
        Self {
            source: Some(BufReader::with_capacity(byte_len, source)),
            decoder: Decoder::new(table),
            cache: Vec::with_capacity(cache_size),
            next_read: 0,
            cache_size,
            eof: false,
        }
    }

    /// Refill the character cache. Returns `false` at end of stream.
    fn fill_cache(&mut self) -> Result<bool> {
        let Self {
            source,
            decoder,
            cache,
            next_read,
            eof,
            ..
        } = self;
        let source = source.as_mut().ok_or(CcsidError::Closed)?;
        cache.clear();
        *next_read = 0;
        if *eof {
            return Ok(false);
        }

        let mut decoded = String::new();
        while decoded.is_empty() {
            let chunk = match source.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            let read = chunk.len();
            if read == 0 {
                *eof = true;
                let pending = decoder.pending_len();
                decoder.finish(&mut decoded)?;
                trace!(pending, "Byte source exhausted");
                break;
            }
            decoder.decode_chunk(chunk, &mut decoded);
            source.consume(read);
        }

        cache.extend(decoded.chars());
        trace!(
            ccsid = decoder.table().ccsid(),
            chars = cache.len(),
            "Refilled character cache"
        );
        Ok(!cache.is_empty())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.source.is_none() {
            return Err(CcsidError::Closed);
        }
        Ok(())
    }

    /// Make sure at least one character is cached. `false` at end of stream.
    fn has_cached(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.next_read < self.cache.len() {
            return Ok(true);
        }
        self.fill_cache()
    }

    /// Read one character.
    ///
    /// # Errors
    /// `Closed`, `MalformedSequence` if the stream ends mid-sequence, or `Io`.
    pub fn read_char(&mut self) -> Result<Option<char>> {
        if !self.has_cached()? {
            return Ok(None);
        }
        let ch = self.cache[self.next_read];
        self.next_read += 1;
        Ok(Some(ch))
    }

    /// Read up to `buf.len()` characters into `buf`.
    ///
    /// Returns the number of characters stored, or `None` at end of stream.
    /// An empty `buf` reads nothing and returns `Some(0)`.
    pub fn read(&mut self, buf: &mut [char]) -> Result<Option<usize>> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let mut filled = 0;
        while filled < buf.len() {
            // Return what is already decoded rather than block on another refill.
            if filled > 0 && self.next_read == self.cache.len() {
                break;
            }
            if !self.has_cached()? {
                break;
            }
            let available = &self.cache[self.next_read..];
            let n = available.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&available[..n]);
            self.next_read += n;
            filled += n;
        }
        Ok(if filled == 0 { None } else { Some(filled) })
    }

    /// Read up to `n` characters as a string; `None` at end of stream.
    pub fn read_string(&mut self, n: usize) -> Result<Option<String>> {
        self.ensure_open()?;
        if n == 0 {
            return Ok(Some(String::new()));
        }
        let mut out = String::new();
        let mut remaining = n;
        while remaining > 0 {
            if !self.has_cached()? {
                break;
            }
            let end = (self.next_read + remaining).min(self.cache.len());
            out.extend(&self.cache[self.next_read..end]);
            remaining -= end - self.next_read;
            self.next_read = end;
        }
        Ok(if remaining == n { None } else { Some(out) })
    }

    /// Skip up to `n` characters. Returns how many were skipped.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        self.ensure_open()?;
        let mut skipped = 0u64;
        while skipped < n {
            if !self.has_cached()? {
                break;
            }
            let available = (self.cache.len() - self.next_read) as u64;
            let step = available.min(n - skipped);
            self.next_read += step as usize;
            skipped += step;
        }
        Ok(skipped)
    }

    /// Whether characters are decoded or source bytes are buffered.
    ///
    /// With both caches empty this fills the byte cache once, which waits on
    /// the source if it has nothing to hand out yet.
    pub fn ready(&mut self) -> Result<bool> {
        let source = self.source.as_mut().ok_or(CcsidError::Closed)?;
        if self.next_read < self.cache.len() || !source.buffer().is_empty() {
            return Ok(true);
        }
        if self.eof {
            return Ok(false);
        }
        loop {
            match source.fill_buf() {
                Ok(buf) => return Ok(!buf.is_empty()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the reader and release its caches. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(ccsid = self.decoder.table().ccsid(), "Closed reader");
        }
        self.cache = Vec::new();
        self.next_read = 0;
        self.decoder.reset();
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Iterate over the remaining characters.
    ///
    /// The iterator ends after end of stream or the first error.
    pub fn chars(&mut self) -> Chars<'_, R> {
        Chars {
            reader: self,
            done: false,
        }
    }

    pub fn ccsid(&self) -> u16 {
        self.decoder.table().ccsid()
    }

    pub fn encoding(&self) -> &'static str {
        self.decoder.table().encoding()
    }

    pub fn category(&self) -> TableCategory {
        self.decoder.table().category()
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn byte_cache_size(&self) -> usize {
        byte_cache_len(self.category(), self.cache_size)
    }

    /// Mark/reset is not supported.
    pub fn mark_supported(&self) -> bool {
        false
    }
}

impl<R: Read> std::fmt::Debug for ConvTableReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvTableReader")
            .field("ccsid", &self.ccsid())
            .field("cache_size", &self.cache_size)
            .field("cached", &(self.cache.len() - self.next_read))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Iterator returned by [`ConvTableReader::chars`].
pub struct Chars<'a, R: Read> {
    reader: &'a mut ConvTableReader<R>,
    done: bool,
}

impl<R: Read> Iterator for Chars<'_, R> {
    type Item = Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_char() {
            Ok(Some(ch)) => Some(Ok(ch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for Chars<'_, R> {}
