//! Frame dispatcher: reads one frame from a byte source and resolves it to
//! a typed reply.
//!
//! ```text
//! byte source ──> header (20 bytes, pooled buffer)
//!                   ├─ sentinel / length checks
//!                   ├─ pending single-use instance?   (expect_reply)
//!                   ├─ registered prototype factory?  (register_prototype)
//!                   └─ GenericReply
//!                 payload (length - 20 bytes) ──> ReplyDataStream::receive
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, trace};

use crate::code_points::*;
use crate::config::DataStreamConfig;
use crate::error::{DataStreamError, Result};
use crate::frame::{hex_preview, DataStream, FrameKey};
use crate::pool::HeaderPool;
use crate::reply::{GenericReply, ReplyDataStream, ReplyFactory};

/// Resolves received frames to reply variants.
///
/// Prototypes are registered up front and read-only afterwards; pending
/// single-use instances may be added from any thread while a receive is in
/// progress.
pub struct DataStreamDispatcher {
    config: DataStreamConfig,
    prototypes: HashMap<FrameKey, ReplyFactory>,
    pending: Mutex<HashMap<FrameKey, Box<dyn ReplyDataStream>>>,
    pool: HeaderPool,
}

impl std::fmt::Debug for DataStreamDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.prototypes.keys().collect();
        keys.sort();
        f.debug_struct("DataStreamDispatcher")
            .field("config", &self.config)
            .field("prototypes", &keys)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Default for DataStreamDispatcher {
    fn default() -> Self {
        Self::new(DataStreamConfig::default())
    }
}

impl DataStreamDispatcher {
    pub fn new(config: DataStreamConfig) -> Self {
        let pool = HeaderPool::new(config.header_pool_idle);
        Self {
            config,
            prototypes: HashMap::new(),
            pending: Mutex::new(HashMap::new()),
            pool,
        }
    }

    /// Register the reply variant for frames with `key`.
    ///
    /// Returns the factory previously registered for `key`, if any.
    pub fn register_prototype(&mut self, key: FrameKey, factory: ReplyFactory) -> Option<ReplyFactory> {
        debug!(key = %key, "Registered reply prototype");
        self.prototypes.insert(key, factory)
    }

    /// Register an instance to receive the next frame with `key`.
    ///
    /// The instance is used once and takes precedence over any prototype.
    pub fn expect_reply(&self, key: FrameKey, instance: Box<dyn ReplyDataStream>) {
        self.lock_pending().insert(key, instance);
    }

    /// Pending single-use instances not yet matched.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn config(&self) -> &DataStreamConfig {
        &self.config
    }

    /// Header buffers currently on loan.
    pub fn headers_in_use(&self) -> usize {
        self.pool.in_use()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<FrameKey, Box<dyn ReplyDataStream>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, key: FrameKey) -> Box<dyn ReplyDataStream> {
        if let Some(instance) = self.lock_pending().remove(&key) {
            trace!(key = %key, "Matched pending reply instance");
            return instance;
        }
        match self.prototypes.get(&key) {
            Some(factory) => factory(),
            None => GenericReply::boxed(),
        }
    }

    /// Read one frame and resolve it to its reply variant.
    ///
    /// # Errors
    /// - `ConnectionDropped` if the source ends inside the header or payload.
    /// - `MalformedFrame` if byte 6 is not 0xE0 or the declared length is
    ///   shorter than the header or over the configured limit. No payload
    ///   bytes are read in that case.
    /// - `Io` for any other read failure.
    pub async fn receive<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<Box<dyn ReplyDataStream>> {
        let mut header = self.pool.checkout();
        read_fully(reader, &mut header).await?;

        if header[OFFSET_SERVER_ID] != HEADER_SENTINEL {
            error!(
                header_hex = %hex_preview(&header, HEADER_LENGTH),
                "Incorrect data stream header"
            );
            return Err(DataStreamError::MalformedFrame(format!(
                "Expected 0x{:02X} at header offset 6, got 0x{:02X}",
                HEADER_SENTINEL, header[OFFSET_SERVER_ID]
            )));
        }

        let length = (&header[OFFSET_LENGTH..]).get_u32() as usize;
        if length < HEADER_LENGTH {
            return Err(DataStreamError::MalformedFrame(format!(
                "Data stream length {} is less than header size {}",
                length, HEADER_LENGTH
            )));
        }
        if length > self.config.max_frame_length {
            return Err(DataStreamError::MalformedFrame(format!(
                "Data stream length {} exceeds maximum {}",
                length, self.config.max_frame_length
            )));
        }

        let key = FrameKey::from_header(&header);
        let mut reply = self.resolve(key);

        let mut data = BytesMut::zeroed(length);
        data[..HEADER_LENGTH].copy_from_slice(&header);
        drop(header);
        read_fully(reader, &mut data[HEADER_LENGTH..]).await?;

        let frame = DataStream::from_bytes(data)?;
        debug!(
            server_id = frame.server_id(),
            req_rep_id = frame.req_rep_id(),
            correlation = frame.correlation(),
            length,
            payload_hex = %hex_preview(frame.payload(), 64),
            "Recv data stream"
        );
        reply.receive(frame)?;
        Ok(reply)
    }
}

/// Fill `buf` from `reader`; a short stream is a dropped connection.
async fn read_fully<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut received = 0;
    while received < buf.len() {
        match reader.read(&mut buf[received..]).await {
            Ok(0) => {
                error!(expected = buf.len(), received, "Connection dropped mid data stream");
                return Err(DataStreamError::ConnectionDropped {
                    expected: buf.len(),
                    received,
                });
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DataStreamError::Io(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{ExchangeSeedReply, StartServerReply};

    fn seed_reply(rc: u32) -> Vec<u8> {
        let mut payload = rc.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xAB; 8]);
        DataStream::request(ServerId::SIGNON, EXCHANGE_SEED_REPLY, 4, &payload)
            .as_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn test_generic_fallback() {
        let dispatcher = DataStreamDispatcher::default();
        let bytes = DataStream::request(ServerId::FILE, 0x8001, 0, b"abc")
            .as_bytes()
            .to_vec();
        let reply = dispatcher.receive(&mut &bytes[..]).await.unwrap();
        assert!(reply.downcast_ref::<GenericReply>().is_some());
        assert_eq!(reply.data_stream().payload(), b"abc");
        assert_eq!(dispatcher.headers_in_use(), 0);
    }

    #[tokio::test]
    async fn test_prototype_lookup() {
        let mut dispatcher = DataStreamDispatcher::default();
        let key = FrameKey::new(ServerId::SIGNON, EXCHANGE_SEED_REPLY);
        assert!(dispatcher
            .register_prototype(key, ExchangeSeedReply::boxed)
            .is_none());

        let bytes = seed_reply(0);
        let reply = dispatcher.receive(&mut &bytes[..]).await.unwrap();
        let seed = reply.downcast_ref::<ExchangeSeedReply>().unwrap();
        assert_eq!(seed.server_seed().unwrap(), [0xAB; 8]);
    }

    #[tokio::test]
    async fn test_pending_instance_is_single_use() {
        let mut dispatcher = DataStreamDispatcher::default();
        let key = FrameKey::new(ServerId::SIGNON, EXCHANGE_SEED_REPLY);
        dispatcher.register_prototype(key, GenericReply::boxed);
        dispatcher.expect_reply(key, ExchangeSeedReply::boxed());
        assert_eq!(dispatcher.pending_count(), 1);

        let bytes = seed_reply(0);
        let first = dispatcher.receive(&mut &bytes[..]).await.unwrap();
        assert!(first.downcast_ref::<ExchangeSeedReply>().is_some());
        assert_eq!(dispatcher.pending_count(), 0);

        let second = dispatcher.receive(&mut &bytes[..]).await.unwrap();
        assert!(second.downcast_ref::<GenericReply>().is_some());
    }

    #[tokio::test]
    async fn test_bad_sentinel() {
        let dispatcher = DataStreamDispatcher::default();
        let mut bytes = DataStream::request(ServerId::FILE, 1, 0, &[1, 2, 3]).as_bytes().to_vec();
        bytes[6] = 0x00;
        let err = dispatcher.receive(&mut &bytes[..]).await.unwrap_err();
        assert!(matches!(err, DataStreamError::MalformedFrame(_)));
        assert_eq!(dispatcher.headers_in_use(), 0);
    }

    #[tokio::test]
    async fn test_length_bounds() {
        let config = DataStreamConfig {
            max_frame_length: 64,
            ..DataStreamConfig::default()
        };
        let dispatcher = DataStreamDispatcher::new(config);

        let mut short = DataStream::request(ServerId::FILE, 1, 0, &[]);
        short.set_length(19);
        let err = dispatcher.receive(&mut short.as_bytes()).await.unwrap_err();
        assert!(matches!(err, DataStreamError::MalformedFrame(_)));

        let big = DataStream::request(ServerId::FILE, 1, 0, &[0; 50]);
        let err = dispatcher.receive(&mut big.as_bytes()).await.unwrap_err();
        assert!(matches!(err, DataStreamError::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_short_header() {
        let dispatcher = DataStreamDispatcher::default();
        let bytes = [0u8; 10];
        let err = dispatcher.receive(&mut &bytes[..]).await.unwrap_err();
        assert!(matches!(
            err,
            DataStreamError::ConnectionDropped { expected: 20, received: 10 }
        ));
        assert_eq!(dispatcher.headers_in_use(), 0);
    }

    #[tokio::test]
    async fn test_short_payload() {
        let dispatcher = DataStreamDispatcher::default();
        let bytes = DataStream::request(ServerId::FILE, 1, 0, &[0; 8]).as_bytes().to_vec();
        let err = dispatcher.receive(&mut &bytes[..24]).await.unwrap_err();
        assert!(matches!(
            err,
            DataStreamError::ConnectionDropped { expected: 8, received: 4 }
        ));
    }

    #[tokio::test]
    async fn test_variant_rejects_short_frame() {
        let mut dispatcher = DataStreamDispatcher::default();
        let key = FrameKey::new(ServerId::REMOTE_COMMAND, START_SERVER_REPLY);
        dispatcher.register_prototype(key, StartServerReply::boxed);
        let bytes = DataStream::request(ServerId::REMOTE_COMMAND, START_SERVER_REPLY, 0, &[0, 0])
            .as_bytes()
            .to_vec();
        let err = dispatcher.receive(&mut &bytes[..]).await.unwrap_err();
        assert!(matches!(err, DataStreamError::MalformedFrame(_)));
    }
}
