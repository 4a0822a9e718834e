//! Host server data-stream framing for OpenMidrange.
//!
//! Every exchange with a host server is a frame with a fixed 20-byte header
//! (length, header ID, server ID, CS instance, correlation ID, template
//! length, request/reply ID) followed by a payload. This crate reads and
//! writes those frames over any async byte source and resolves received
//! frames to typed replies.
//!
//! # Architecture
//!
//! ```text
//! AsyncRead ──> DataStreamDispatcher
//!                  ├─ header pool (pool.rs)
//!                  ├─ frame accessors (frame.rs)
//!                  ├─ reply variants (reply.rs)
//!                  └─ payload text ──> open_midrange_ccsid tables/readers
//! ```
//!
//! # Example
//!
//! ```rust
//! use open_midrange_datastream::{
//!     code_points::EXCHANGE_SEED_REPLY, DataStream, DataStreamDispatcher, ExchangeSeedReply,
//!     FrameKey, ServerId,
//! };
//!
//! # tokio_test_block(async {
//! let mut dispatcher = DataStreamDispatcher::default();
//! dispatcher.register_prototype(
//!     FrameKey::new(ServerId::SIGNON, EXCHANGE_SEED_REPLY),
//!     ExchangeSeedReply::boxed,
//! );
//!
//! let mut payload = vec![0, 0, 0, 0];
//! payload.extend_from_slice(&[7; 8]);
//! let wire = DataStream::request(ServerId::SIGNON, EXCHANGE_SEED_REPLY, 4, &payload);
//!
//! let reply = dispatcher.receive(&mut wire.as_bytes()).await.unwrap();
//! let seed = reply.downcast_ref::<ExchangeSeedReply>().unwrap();
//! assert_eq!(seed.server_seed().unwrap(), [7; 8]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod code_points;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod pool;
pub mod reply;

pub use code_points::{ServerId, HEADER_LENGTH, HEADER_SENTINEL};
pub use config::DataStreamConfig;
pub use dispatcher::DataStreamDispatcher;
pub use error::{DataStreamError, Result};
pub use frame::{hex_preview, write_data_stream, DataStream, FrameKey};
pub use pool::{HeaderBuffer, HeaderPool};
pub use reply::{
    exchange_seed_request, ExchangeSeedReply, GenericReply, ReplyDataStream, ReplyFactory,
    StartServerReply,
};
