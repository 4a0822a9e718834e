//! Host data-stream frames.
//!
//! Every request and reply exchanged with a host server is a single frame:
//! a fixed 20-byte header followed by a payload.
//!
//! ```text
//! Offset  Len  Field
//! 0       4    Total length (big-endian, includes the 20-byte header)
//! 4       2    Header ID
//! 6       2    Server ID (byte 6 is always 0xE0)
//! 8       4    CS instance
//! 12      4    Correlation ID
//! 16      2    Template length
//! 18      2    Request/reply ID
//! 20      ..   Payload (template, then variable data)
//! ```

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use open_midrange_ccsid::{ConvTable, ConvTableReader};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::code_points::*;
use crate::error::{DataStreamError, Result};

/// Identity used to match a received frame to its reply variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub server_id: u16,
    pub req_rep_id: u16,
}

impl FrameKey {
    pub const fn new(server_id: u16, req_rep_id: u16) -> Self {
        Self {
            server_id,
            req_rep_id,
        }
    }

    /// Key read from raw header bytes. `header` must hold at least 20 bytes.
    pub(crate) fn from_header(header: &[u8]) -> Self {
        Self {
            server_id: (&header[OFFSET_SERVER_ID..]).get_u16(),
            req_rep_id: (&header[OFFSET_REQ_REP_ID..]).get_u16(),
        }
    }
}

impl std::fmt::Display for FrameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}/0x{:04X}", self.server_id, self.req_rep_id)
    }
}

/// One data-stream frame over an owned byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStream {
    data: BytesMut,
}

impl Default for DataStream {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStream {
    /// Header-only frame with every field zero.
    pub fn new() -> Self {
        Self {
            data: BytesMut::zeroed(HEADER_LENGTH),
        }
    }

    /// Zeroed frame of `len` bytes (at least the header) with the length
    /// field set.
    pub fn with_length(len: usize) -> Self {
        let len = len.max(HEADER_LENGTH);
        let mut ds = Self {
            data: BytesMut::zeroed(len),
        };
        ds.set_length(len as u32);
        ds
    }

    /// Wrap received bytes.
    ///
    /// # Errors
    /// Returns `DataStreamError::MalformedFrame` if `bytes` is shorter than
    /// the header.
    pub fn from_bytes(bytes: impl Into<BytesMut>) -> Result<Self> {
        let data = bytes.into();
        if data.len() < HEADER_LENGTH {
            return Err(DataStreamError::MalformedFrame(format!(
                "Frame of {} bytes is shorter than the {}-byte header",
                data.len(),
                HEADER_LENGTH
            )));
        }
        Ok(Self { data })
    }

    /// Build a request frame. `payload` starts with the `template_len`-byte
    /// template.
    pub fn request(server_id: u16, req_rep_id: u16, template_len: u16, payload: &[u8]) -> Self {
        let total_len = HEADER_LENGTH + payload.len();
        let mut buf = BytesMut::with_capacity(total_len);
        buf.put_u32(total_len as u32);
        buf.put_u16(0); // header ID
        buf.put_u16(server_id);
        buf.put_u32(0); // CS instance
        buf.put_u32(0); // correlation
        buf.put_u16(template_len);
        buf.put_u16(req_rep_id);
        buf.extend_from_slice(payload);
        Self { data: buf }
    }

    fn get_u16_at(&self, offset: usize) -> u16 {
        (&self.data[offset..]).get_u16()
    }

    fn get_u32_at(&self, offset: usize) -> u32 {
        (&self.data[offset..]).get_u32()
    }

    fn set_u16_at(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn set_u32_at(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Declared total length (offsets 0-3).
    pub fn length(&self) -> u32 {
        self.get_u32_at(OFFSET_LENGTH)
    }

    /// Write the total-length field. The buffer itself is not resized.
    pub fn set_length(&mut self, len: u32) {
        self.set_u32_at(OFFSET_LENGTH, len);
    }

    pub fn header_id(&self) -> u16 {
        self.get_u16_at(OFFSET_HEADER_ID)
    }

    pub fn set_header_id(&mut self, id: u16) {
        self.set_u16_at(OFFSET_HEADER_ID, id);
    }

    pub fn server_id(&self) -> u16 {
        self.get_u16_at(OFFSET_SERVER_ID)
    }

    pub fn set_server_id(&mut self, id: u16) {
        self.set_u16_at(OFFSET_SERVER_ID, id);
    }

    pub fn cs_instance(&self) -> u32 {
        self.get_u32_at(OFFSET_CS_INSTANCE)
    }

    pub fn set_cs_instance(&mut self, id: u32) {
        self.set_u32_at(OFFSET_CS_INSTANCE, id);
    }

    pub fn correlation(&self) -> u32 {
        self.get_u32_at(OFFSET_CORRELATION)
    }

    pub fn set_correlation(&mut self, id: u32) {
        self.set_u32_at(OFFSET_CORRELATION, id);
    }

    pub fn template_len(&self) -> u16 {
        self.get_u16_at(OFFSET_TEMPLATE_LEN)
    }

    pub fn set_template_len(&mut self, len: u16) {
        self.set_u16_at(OFFSET_TEMPLATE_LEN, len);
    }

    pub fn req_rep_id(&self) -> u16 {
        self.get_u16_at(OFFSET_REQ_REP_ID)
    }

    pub fn set_req_rep_id(&mut self, id: u16) {
        self.set_u16_at(OFFSET_REQ_REP_ID, id);
    }

    /// Whether header byte 6 holds the 0xE0 sentinel.
    pub fn has_sentinel(&self) -> bool {
        self.data[OFFSET_SERVER_ID] == HEADER_SENTINEL
    }

    pub fn key(&self) -> FrameKey {
        FrameKey::from_header(&self.data)
    }

    /// Bytes after the header.
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LENGTH..]
    }

    /// Fixed-format template at the start of the payload, truncated to the
    /// bytes actually present.
    pub fn template(&self) -> &[u8] {
        let payload = self.payload();
        &payload[..payload.len().min(usize::from(self.template_len()))]
    }

    /// The whole frame, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    /// Read a big-endian u32 at a frame offset.
    ///
    /// # Errors
    /// Returns `DataStreamError::MalformedFrame` if the field lies past the end.
    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        self.field(offset, 4).map(|mut b| b.get_u32())
    }

    /// Read `len` raw bytes at a frame offset.
    ///
    /// # Errors
    /// Returns `DataStreamError::MalformedFrame` if the field lies past the end.
    pub fn field(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                DataStreamError::MalformedFrame(format!(
                    "Field of {} bytes at offset {} is past the end of a {}-byte frame",
                    len,
                    offset,
                    self.data.len()
                ))
            })
    }

    /// Decode `len` bytes of host text at a frame offset.
    ///
    /// # Errors
    /// Returns `DataStreamError::Conversion` if the range is outside the frame.
    pub fn text(&self, offset: usize, len: usize, table: &ConvTable) -> Result<String> {
        Ok(table.decode_range(&self.data, offset, len)?)
    }

    /// Character reader over the payload.
    pub fn payload_reader(&self, table: Arc<ConvTable>) -> ConvTableReader<bytes::buf::Reader<Bytes>> {
        let payload = Bytes::copy_from_slice(self.payload());
        ConvTableReader::new(payload.reader(), table)
    }
}

/// Hex dump of the first `max_len` bytes, for trace output.
pub fn hex_preview(data: &[u8], max_len: usize) -> String {
    let len = data.len().min(max_len);
    let hex: Vec<String> = data[..len].iter().map(|b| format!("{:02x}", b)).collect();
    let result = hex.join(" ");
    if data.len() > max_len {
        format!("{}...(+{} bytes)", result, data.len() - max_len)
    } else {
        result
    }
}

/// Write a frame to a byte sink.
pub async fn write_data_stream<W: AsyncWrite + Unpin>(writer: &mut W, ds: &DataStream) -> Result<()> {
    tracing::debug!(
        server_id = ds.server_id(),
        req_rep_id = ds.req_rep_id(),
        length = ds.length(),
        header_hex = %hex_preview(ds.as_bytes(), HEADER_LENGTH),
        "Send data stream"
    );
    writer.write_all(ds.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed_header() {
        let ds = DataStream::new();
        assert_eq!(ds.as_bytes(), &[0u8; HEADER_LENGTH]);
        assert!(ds.payload().is_empty());
        assert!(!ds.has_sentinel());
    }

    #[test]
    fn test_set_length_writes_offsets_0_to_3() {
        let mut ds = DataStream::new();
        ds.set_length(0x0102_0304);
        assert_eq!(&ds.as_bytes()[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(ds.length(), 0x0102_0304);
    }

    #[test]
    fn test_header_fields_big_endian() {
        let mut ds = DataStream::with_length(24);
        ds.set_header_id(0x1122);
        ds.set_server_id(ServerId::SIGNON);
        ds.set_cs_instance(0xAABBCCDD);
        ds.set_correlation(7);
        ds.set_template_len(2);
        ds.set_req_rep_id(0x7003);

        let bytes = ds.as_bytes();
        assert_eq!(&bytes[..4], &[0, 0, 0, 24]);
        assert_eq!(&bytes[4..6], &[0x11, 0x22]);
        assert_eq!(&bytes[6..8], &[0xE0, 0x09]);
        assert_eq!(&bytes[8..12], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 7]);
        assert_eq!(&bytes[16..18], &[0, 2]);
        assert_eq!(&bytes[18..20], &[0x70, 0x03]);

        assert_eq!(ds.cs_instance(), 0xAABBCCDD);
        assert_eq!(ds.key(), FrameKey::new(ServerId::SIGNON, 0x7003));
        assert_eq!(ds.template(), &[0, 0]);
        assert!(ds.has_sentinel());
    }

    #[test]
    fn test_from_bytes_too_short() {
        let err = DataStream::from_bytes(&[0u8; 10][..]).unwrap_err();
        assert!(matches!(err, DataStreamError::MalformedFrame(_)));
    }

    #[test]
    fn test_request_builder() {
        let ds = DataStream::request(ServerId::CENTRAL, 0x1201, 2, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(ds.length(), 23);
        assert_eq!(ds.server_id(), ServerId::CENTRAL);
        assert_eq!(ds.template(), &[0xAA, 0xBB]);
        assert_eq!(ds.payload(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_template_truncated_to_payload() {
        let mut ds = DataStream::with_length(21);
        ds.set_template_len(8);
        assert_eq!(ds.template().len(), 1);
    }

    #[test]
    fn test_text_and_payload_reader() {
        let cp037 = Arc::new(ConvTable::bundled(37).unwrap());
        let ds = DataStream::request(ServerId::FILE, 0x0001, 0, &[0xC8, 0xC9]);
        assert_eq!(ds.text(20, 2, &cp037).unwrap(), "HI");
        assert!(matches!(
            ds.text(21, 5, &cp037),
            Err(DataStreamError::Conversion(_))
        ));

        let mut reader = ds.payload_reader(cp037);
        assert_eq!(reader.read_string(10).unwrap().as_deref(), Some("HI"));
    }

    #[test]
    fn test_field_bounds() {
        let ds = DataStream::request(ServerId::FILE, 0x0001, 0, &[0, 0, 0, 5]);
        assert_eq!(ds.u32_at(20).unwrap(), 5);
        assert!(ds.u32_at(21).is_err());
        assert!(ds.field(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_hex_preview() {
        assert_eq!(hex_preview(&[0xE0, 0x09], 4), "e0 09");
        assert_eq!(hex_preview(&[1, 2, 3], 2), "01 02...(+1 bytes)");
    }

    #[tokio::test]
    async fn test_write_data_stream() {
        let ds = DataStream::request(ServerId::DATABASE, 0x1F80, 0, b"xyz");
        let mut sink = Vec::new();
        write_data_stream(&mut sink, &ds).await.unwrap();
        assert_eq!(sink, ds.as_bytes());
    }
}
