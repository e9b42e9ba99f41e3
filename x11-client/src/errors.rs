//! Error types for the X11 client.

use std::io;
use std::time::Duration;
use thiserror::Error;
use x11_protocol::{HandshakeState, ProtocolError};

/// Errors that can occur while opening or using an X11 connection.
#[derive(Debug, Error)]
pub enum XClientError {
    /// The display identifier (and `DISPLAY`) could not be parsed.
    #[error("Invalid display name: {0:?}")]
    InvalidDisplayName(String),

    /// Neither `XAUTHORITY` nor `HOME` is set.
    #[error("Unable to locate authority file")]
    LocationUnresolvable,

    /// The authority file contains a truncated record.
    #[error("Malformed authority record: {0}")]
    MalformedRecord(String),

    /// No authority record matched.
    #[error("No matching authority record")]
    NotFound,

    /// The display names a network protocol this client cannot dial.
    #[error("Unsupported transport: {0:?}")]
    UnsupportedTransport(String),

    /// Dialing the display's socket failed.
    #[error("Dial failed: {0}")]
    DialFailed(String),

    /// The transport accepted fewer bytes than were offered.
    #[error("Short write: {written} of {expected} bytes written")]
    ShortWrite {
        /// Bytes actually accepted.
        written: usize,
        /// Bytes offered.
        expected: usize,
    },

    /// The server closed the stream in the middle of the setup response.
    #[error("Truncated setup response: expected {expected} bytes, got {got}")]
    TruncatedResponse {
        /// Bytes the header announced.
        expected: usize,
        /// Bytes received before end of stream.
        got: usize,
    },

    /// The server refused the connection.
    #[error("Connection refused by server: {0}")]
    Rejected(String),

    /// The server requires further authentication.
    #[error("Server requires further authentication: {0}")]
    AuthRequired(String),

    /// The connection pump failed to read from or write to the transport.
    #[error("Pump transport error: {0}")]
    PumpTransport(String),

    /// Malformed data on the wire.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport-level error (socket operations).
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// An operation did not complete in time.
    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the attempt.
    #[error("Cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The connection has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl XClientError {
    /// Returns true if this error is potentially retryable.
    ///
    /// Retryable errors are transient transport conditions. Refusals,
    /// authentication demands and configuration errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Timeout(_)
                | Self::DialFailed(_)
                | Self::TruncatedResponse { .. }
                | Self::PumpTransport(_)
        )
    }

    /// Returns true if this is a fatal error that should not be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// The server-supplied reason for a refusal or authentication demand.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected(reason) | Self::AuthRequired(reason) => Some(reason),
            _ => None,
        }
    }

    /// The terminal handshake state an attempt ends in when it fails with
    /// this error.
    #[must_use]
    pub fn terminal_state(&self) -> HandshakeState {
        match self {
            Self::Rejected(_) => HandshakeState::Rejected,
            Self::AuthRequired(_) => HandshakeState::AuthRequired,
            _ => HandshakeState::Failed,
        }
    }
}

impl From<ProtocolError> for XClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidDisplayName(name) => Self::InvalidDisplayName(name),
            ProtocolError::LocationUnresolvable => Self::LocationUnresolvable,
            ProtocolError::MalformedRecord(detail) => Self::MalformedRecord(detail),
            ProtocolError::NotFound => Self::NotFound,
            ProtocolError::ShortWrite { written, expected } => {
                Self::ShortWrite { written, expected }
            }
            ProtocolError::TruncatedResponse { expected, got } => {
                Self::TruncatedResponse { expected, got }
            }
            ProtocolError::Violation(detail) => Self::Protocol(detail),
            ProtocolError::Io(err) => Self::Transport(err),
        }
    }
}
