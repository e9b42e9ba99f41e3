//! Error type for the X11 protocol layer.

use std::io;
use thiserror::Error;

/// Errors produced while resolving a display, scanning an authority file, or
/// exchanging the connection-setup messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The display identifier (or the `DISPLAY` fallback) could not be parsed.
    #[error("invalid display name {0:?}")]
    InvalidDisplayName(String),

    /// Neither `XAUTHORITY` nor `HOME` is set.
    #[error("unable to locate authority file: neither XAUTHORITY nor HOME is set")]
    LocationUnresolvable,

    /// An authority record ended before all of its fields were read.
    #[error("malformed authority record: {0}")]
    MalformedRecord(String),

    /// No authority record matched the query.
    #[error("no matching authority record")]
    NotFound,

    /// The transport accepted fewer bytes than were offered.
    #[error("short write: {written} of {expected} bytes written")]
    ShortWrite {
        /// Bytes actually accepted by the transport.
        written: usize,
        /// Bytes that were offered.
        expected: usize,
    },

    /// The server closed the stream before the full setup response arrived.
    #[error("truncated setup response: expected {expected} bytes, got {got}")]
    TruncatedResponse {
        /// Bytes the header (or the fixed header size) announced.
        expected: usize,
        /// Bytes actually received.
        got: usize,
    },

    /// Data that violates the wire format (bad status, bad marker, oversize field).
    #[error("protocol violation: {0}")]
    Violation(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}
