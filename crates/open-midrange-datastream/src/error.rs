//! Data-stream error types.

use miette::Diagnostic;
use open_midrange_ccsid::CcsidError;
use thiserror::Error;

/// Errors that can occur while framing or dispatching host data streams.
#[derive(Error, Debug, Diagnostic)]
pub enum DataStreamError {
    /// The peer closed the connection before a full header or payload arrived.
    #[error("Connection dropped: expected {expected} byte(s), received {received}")]
    #[diagnostic(code(datastream::connection_dropped))]
    ConnectionDropped { expected: usize, received: usize },

    /// Header sentinel mismatch or inconsistent length. Fatal to the connection.
    #[error("Malformed data stream: {0}")]
    #[diagnostic(code(datastream::malformed_frame))]
    MalformedFrame(String),

    /// Payload text could not be converted.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] CcsidError),

    /// I/O error on the byte source or sink.
    #[error("I/O error: {0}")]
    #[diagnostic(code(datastream::io))]
    Io(#[from] std::io::Error),
}

/// Result type for data-stream operations.
pub type Result<T> = std::result::Result<T, DataStreamError>;
