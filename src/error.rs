//! Error type shared by the library modules.
use thiserror::Error;

/// Errors raised by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration file missing, unparseable, or holding invalid values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transport to the exchange could not be established.
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Fewer than a full record's worth of bytes were available.
    #[error("malformed packet: expected 16 bytes, got {len}")]
    MalformedPacket { len: usize },

    /// A packet value cannot be represented in the wire record.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// Corrupt capture file frame.
    #[error("capture error: {0}")]
    Capture(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
