//! Core types shared by the connection-setup messages.

use bytes::BufMut;
use std::fmt;

/// Major version of the X protocol spoken by this crate.
pub const PROTOCOL_MAJOR_VERSION: u16 = 11;

/// Minor version of the X protocol spoken by this crate.
pub const PROTOCOL_MINOR_VERSION: u16 = 0;

/// Byte-order marker for most-significant-byte-first traffic (ASCII `B`).
pub const MSB_FIRST_MARKER: u8 = b'B';

/// Byte-order marker for least-significant-byte-first traffic (ASCII `l`).
pub const LSB_FIRST_MARKER: u8 = b'l';

/// Byte order used for every multi-byte integer on one connection.
///
/// The client announces the order in the first byte of the client prefix and
/// the server answers in the same order for the lifetime of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Big-endian.
    #[default]
    MsbFirst,
    /// Little-endian.
    LsbFirst,
}

impl ByteOrder {
    /// The byte order of the host CPU.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::MsbFirst
        } else {
            Self::LsbFirst
        }
    }

    /// The marker byte announcing this order in the client prefix.
    #[must_use]
    pub const fn marker(self) -> u8 {
        match self {
            Self::MsbFirst => MSB_FIRST_MARKER,
            Self::LsbFirst => LSB_FIRST_MARKER,
        }
    }

    /// Map a marker byte back to a byte order.
    #[must_use]
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            MSB_FIRST_MARKER => Some(Self::MsbFirst),
            LSB_FIRST_MARKER => Some(Self::LsbFirst),
            _ => None,
        }
    }

    /// Append `value` to `buf` in this order.
    pub fn put_u16<B: BufMut>(self, buf: &mut B, value: u16) {
        match self {
            Self::MsbFirst => buf.put_u16(value),
            Self::LsbFirst => buf.put_u16_le(value),
        }
    }

    /// Decode two wire bytes in this order.
    #[must_use]
    pub fn u16_from(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::MsbFirst => u16::from_be_bytes(bytes),
            Self::LsbFirst => u16::from_le_bytes(bytes),
        }
    }

    /// Decode four wire bytes in this order.
    #[must_use]
    pub fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::MsbFirst => u32::from_be_bytes(bytes),
            Self::LsbFirst => u32::from_le_bytes(bytes),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MsbFirst => write!(f, "MSB-first"),
            Self::LsbFirst => write!(f, "LSB-first"),
        }
    }
}

/// Number of zero bytes needed to bring `len` up to a multiple of 4.
///
/// Already-aligned lengths need no padding.
#[must_use]
pub const fn pad(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// `len` rounded up to the next multiple of 4.
#[must_use]
pub const fn padded_len(len: usize) -> usize {
    len + pad(len)
}

/// Status byte of the server's setup response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStatus {
    /// The server refused the connection; the tail carries a reason.
    Failed,
    /// The connection is accepted; the tail carries the setup data.
    Success,
    /// The server wants further authentication; the tail carries a reason.
    AuthenticateMore,
}

impl SetupStatus {
    /// Decode the status byte. Returns `None` for values outside 0..=2.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Failed),
            1 => Some(Self::Success),
            2 => Some(Self::AuthenticateMore),
            _ => None,
        }
    }

    /// The status byte on the wire.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Failed => 0,
            Self::Success => 1,
            Self::AuthenticateMore => 2,
        }
    }
}

impl fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => write!(f, "Failed"),
            Self::Success => write!(f, "Success"),
            Self::AuthenticateMore => write!(f, "Authenticate"),
        }
    }
}
