//! The unit of data exchanged over an established connection.

use bytes::Bytes;

/// A chunk of protocol bytes travelling through the connection pump.
///
/// `length` is the number of bytes the transmit task must get onto the wire
/// in one write; for inbound messages it is the number of bytes received.
/// The pump imposes no X11 request framing: an inbound message is whatever
/// one read returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Declared length in bytes.
    pub length: usize,
    /// The bytes themselves.
    pub payload: Bytes,
}

impl Message {
    /// A message whose declared length is the payload length.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            length: payload.len(),
            payload,
        }
    }

    /// A message with an explicit declared length.
    ///
    /// The transmit task reports a short write if fewer than `length` bytes
    /// reach the transport.
    pub fn with_length(payload: impl Into<Bytes>, length: usize) -> Self {
        Self {
            length,
            payload: payload.into(),
        }
    }

    /// Number of payload bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consume the message, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&'static [u8]> for Message {
    fn from(payload: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(payload))
    }
}
