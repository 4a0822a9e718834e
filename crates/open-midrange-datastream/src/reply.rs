//! Typed reply variants.
//!
//! The dispatcher resolves each received header to a [`ReplyDataStream`]
//! implementation: a pre-registered single-use instance, a fresh instance
//! from a registered [`ReplyFactory`], or [`GenericReply`].

use std::any::Any;

use crate::code_points::*;
use crate::error::{DataStreamError, Result};
use crate::frame::DataStream;

/// A reply frame resolved to its variant.
pub trait ReplyDataStream: std::fmt::Debug + Send + Sync {
    /// Take ownership of the received frame, checking the variant's layout.
    fn receive(&mut self, frame: DataStream) -> Result<()>;

    /// The received frame.
    fn data_stream(&self) -> &DataStream;

    fn as_any(&self) -> &dyn Any;
}

impl dyn ReplyDataStream {
    /// Downcast to a concrete reply variant.
    pub fn downcast_ref<T: ReplyDataStream + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Zero-argument constructor for a fresh reply of one variant.
pub type ReplyFactory = fn() -> Box<dyn ReplyDataStream>;

fn require_length(frame: &DataStream, min: usize, variant: &str) -> Result<()> {
    let len = frame.as_bytes().len();
    if len < min {
        return Err(DataStreamError::MalformedFrame(format!(
            "{} reply is {} bytes, expected at least {}",
            variant, len, min
        )));
    }
    Ok(())
}

/// Reply with no known variant: header and raw payload only.
#[derive(Debug, Default)]
pub struct GenericReply {
    frame: DataStream,
}

impl GenericReply {
    pub fn boxed() -> Box<dyn ReplyDataStream> {
        Box::<Self>::default()
    }
}

impl ReplyDataStream for GenericReply {
    fn receive(&mut self, frame: DataStream) -> Result<()> {
        self.frame = frame;
        Ok(())
    }

    fn data_stream(&self) -> &DataStream {
        &self.frame
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reply to an exchange-random-seeds request.
///
/// Return code at offset 20, 8-byte server seed at offset 24.
#[derive(Debug, Default)]
pub struct ExchangeSeedReply {
    frame: DataStream,
}

impl ExchangeSeedReply {
    /// Minimum frame length: header, return code, seed.
    pub const LENGTH: usize = HEADER_LENGTH + 4 + 8;

    pub fn boxed() -> Box<dyn ReplyDataStream> {
        Box::<Self>::default()
    }

    pub fn return_code(&self) -> Result<u32> {
        self.frame.u32_at(HEADER_LENGTH)
    }

    pub fn server_seed(&self) -> Result<[u8; 8]> {
        let mut seed = [0u8; 8];
        seed.copy_from_slice(self.frame.field(HEADER_LENGTH + 4, 8)?);
        Ok(seed)
    }
}

impl ReplyDataStream for ExchangeSeedReply {
    fn receive(&mut self, frame: DataStream) -> Result<()> {
        require_length(&frame, Self::LENGTH, "Exchange seed")?;
        self.frame = frame;
        Ok(())
    }

    fn data_stream(&self) -> &DataStream {
        &self.frame
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reply to a start-server request. Return code at offset 20.
#[derive(Debug, Default)]
pub struct StartServerReply {
    frame: DataStream,
}

impl StartServerReply {
    /// Minimum frame length: header and return code.
    pub const LENGTH: usize = HEADER_LENGTH + 4;

    pub fn boxed() -> Box<dyn ReplyDataStream> {
        Box::<Self>::default()
    }

    pub fn return_code(&self) -> Result<u32> {
        self.frame.u32_at(HEADER_LENGTH)
    }
}

impl ReplyDataStream for StartServerReply {
    fn receive(&mut self, frame: DataStream) -> Result<()> {
        require_length(&frame, Self::LENGTH, "Start server")?;
        self.frame = frame;
        Ok(())
    }

    fn data_stream(&self) -> &DataStream {
        &self.frame
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Exchange-random-seeds request for `server_id` carrying the client seed.
pub fn exchange_seed_request(server_id: u16, client_seed: [u8; 8]) -> DataStream {
    DataStream::request(server_id, EXCHANGE_SEED_REQUEST, 8, &client_seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_reply_bytes(rc: u32, seed: [u8; 8]) -> DataStream {
        let mut payload = rc.to_be_bytes().to_vec();
        payload.extend_from_slice(&seed);
        DataStream::request(ServerId::SIGNON, EXCHANGE_SEED_REPLY, 4, &payload)
    }

    #[test]
    fn test_exchange_seed_request_layout() {
        let ds = exchange_seed_request(ServerId::SIGNON, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ds.length(), 28);
        assert_eq!(ds.template_len(), 8);
        assert_eq!(ds.req_rep_id(), EXCHANGE_SEED_REQUEST);
        assert_eq!(ds.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_exchange_seed_reply_fields() {
        let mut reply = ExchangeSeedReply::default();
        reply
            .receive(seed_reply_bytes(0, [9, 8, 7, 6, 5, 4, 3, 2]))
            .unwrap();
        assert_eq!(reply.return_code().unwrap(), 0);
        assert_eq!(reply.server_seed().unwrap(), [9, 8, 7, 6, 5, 4, 3, 2]);
    }

    #[test]
    fn test_exchange_seed_reply_too_short() {
        let mut reply = ExchangeSeedReply::default();
        let short = DataStream::request(ServerId::SIGNON, EXCHANGE_SEED_REPLY, 4, &[0, 0, 0, 0]);
        let err = reply.receive(short).unwrap_err();
        assert!(matches!(err, DataStreamError::MalformedFrame(_)));
    }

    #[test]
    fn test_start_server_reply() {
        let mut reply = StartServerReply::default();
        let ds = DataStream::request(ServerId::REMOTE_COMMAND, START_SERVER_REPLY, 4, &[0, 0, 0x20, 0x01]);
        reply.receive(ds).unwrap();
        assert_eq!(reply.return_code().unwrap(), 0x2001);
    }

    #[test]
    fn test_unreceived_reply_has_no_fields() {
        let reply = ExchangeSeedReply::default();
        assert!(reply.return_code().is_err());
        assert!(reply.server_seed().is_err());
    }

    #[test]
    fn test_downcast() {
        let mut boxed = ExchangeSeedReply::boxed();
        boxed.receive(seed_reply_bytes(4, [0; 8])).unwrap();
        let typed = boxed.downcast_ref::<ExchangeSeedReply>().unwrap();
        assert_eq!(typed.return_code().unwrap(), 4);
        assert!(boxed.downcast_ref::<GenericReply>().is_none());
    }
}
