//! Client-to-server connection-setup message.

use super::types::{pad, padded_len, ByteOrder, PROTOCOL_MAJOR_VERSION, PROTOCOL_MINOR_VERSION};
use crate::error::ProtocolError;
use crate::io::{X11InStream, X11OutStream};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Size of the fixed part of the client prefix.
pub const CLIENT_PREFIX_HEADER_LEN: usize = 12;

/// ClientPrefix message - the first bytes a client sends on a new connection.
///
/// # Wire Format
///
/// - 1 byte: byte-order marker (`B` or `l`)
/// - 1 byte: unused
/// - 2 bytes: protocol major version
/// - 2 bytes: protocol minor version
/// - 2 bytes: authorization protocol name length (n)
/// - 2 bytes: authorization protocol data length (d)
/// - 2 bytes: unused
/// - n bytes: authorization protocol name, padded to a multiple of 4
/// - d bytes: authorization protocol data, padded to a multiple of 4
#[derive(Clone, PartialEq, Eq)]
pub struct ClientPrefix {
    /// Protocol major version requested.
    pub major_version: u16,
    /// Protocol minor version requested.
    pub minor_version: u16,
    /// Authorization protocol name, unpadded.
    pub auth_name: Vec<u8>,
    /// Authorization protocol data, unpadded.
    pub auth_data: Vec<u8>,
}

impl ClientPrefix {
    /// Build a prefix for protocol 11.0 with the given credentials.
    ///
    /// Empty name and data mean "no authorization".
    pub fn new(auth_name: impl Into<Vec<u8>>, auth_data: impl Into<Vec<u8>>) -> Self {
        Self {
            major_version: PROTOCOL_MAJOR_VERSION,
            minor_version: PROTOCOL_MINOR_VERSION,
            auth_name: auth_name.into(),
            auth_data: auth_data.into(),
        }
    }

    /// Total number of bytes [`pack`](Self::pack) produces.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        CLIENT_PREFIX_HEADER_LEN + padded_len(self.auth_name.len()) + padded_len(self.auth_data.len())
    }

    /// Encode the prefix with every integer field in `order`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Violation`] if the name or data does not fit a
    /// 16-bit length field.
    pub fn pack(&self, order: ByteOrder) -> Result<Bytes, ProtocolError> {
        let name_len = field_len("authorization name", &self.auth_name)?;
        let data_len = field_len("authorization data", &self.auth_data)?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(order.marker());
        buf.put_u8(0);
        order.put_u16(&mut buf, self.major_version);
        order.put_u16(&mut buf, self.minor_version);
        order.put_u16(&mut buf, name_len);
        order.put_u16(&mut buf, data_len);
        buf.put_bytes(0, 2);
        buf.put_slice(&self.auth_name);
        buf.put_bytes(0, pad(self.auth_name.len()));
        buf.put_slice(&self.auth_data);
        buf.put_bytes(0, pad(self.auth_data.len()));
        Ok(buf.freeze())
    }

    /// Buffer the prefix on `stream`, using the stream's byte order.
    ///
    /// Produces the same bytes as [`pack`](Self::pack) with that order.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Violation`] if the name or data does not fit a
    /// 16-bit length field. Nothing is buffered in that case.
    pub fn write_to<W: AsyncWrite + Unpin>(
        &self,
        stream: &mut X11OutStream<W>,
    ) -> Result<(), ProtocolError> {
        let name_len = field_len("authorization name", &self.auth_name)?;
        let data_len = field_len("authorization data", &self.auth_data)?;

        stream.write_u8(stream.order().marker());
        stream.write_padding(1);
        stream.write_u16(self.major_version);
        stream.write_u16(self.minor_version);
        stream.write_u16(name_len);
        stream.write_u16(data_len);
        stream.write_padding(2);
        stream.write_bytes(&self.auth_name);
        stream.write_padding(pad(self.auth_name.len()));
        stream.write_bytes(&self.auth_data);
        stream.write_padding(pad(self.auth_data.len()));
        Ok(())
    }

    /// Read a prefix, honouring whichever byte-order marker it starts with.
    ///
    /// The input stream's own order is ignored; the marker decides. Returns
    /// the announced order together with the prefix.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Io`] if the stream ends early,
    /// [`ProtocolError::Violation`] for an unknown marker.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut X11InStream<R>,
    ) -> Result<(ByteOrder, Self), ProtocolError> {
        let marker = stream.read_u8().await?;
        let order = ByteOrder::from_marker(marker).ok_or_else(|| {
            ProtocolError::Violation(format!("invalid byte-order marker 0x{marker:02x}"))
        })?;
        stream.skip(1).await?;

        // Integers arrive in the announced order, not the stream's.
        let mut fields = [0u16; 4];
        for field in &mut fields {
            let value = stream.read_u16().await?;
            *field = if order == stream.order() {
                value
            } else {
                value.swap_bytes()
            };
        }
        let [major_version, minor_version, name_len, data_len] = fields;
        let (name_len, data_len) = (name_len as usize, data_len as usize);
        stream.skip(2).await?;

        let mut auth_name = vec![0u8; padded_len(name_len)];
        stream.read_bytes(&mut auth_name).await?;
        auth_name.truncate(name_len);

        let mut auth_data = vec![0u8; padded_len(data_len)];
        stream.read_bytes(&mut auth_data).await?;
        auth_data.truncate(data_len);

        Ok((
            order,
            Self {
                major_version,
                minor_version,
                auth_name,
                auth_data,
            },
        ))
    }
}

impl fmt::Debug for ClientPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPrefix")
            .field("major_version", &self.major_version)
            .field("minor_version", &self.minor_version)
            .field("auth_name", &String::from_utf8_lossy(&self.auth_name))
            .field("auth_data_len", &self.auth_data.len())
            .finish()
    }
}

fn field_len(what: &str, field: &[u8]) -> Result<u16, ProtocolError> {
    u16::try_from(field.len()).map_err(|_| {
        ProtocolError::Violation(format!("{} is {} bytes, limit is 65535", what, field.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pack_layout_msb_first() {
        let prefix = ClientPrefix::new(b"abc".to_vec(), b"12345".to_vec());
        let bytes = prefix.pack(ByteOrder::MsbFirst).unwrap();

        assert_eq!(bytes.len(), CLIENT_PREFIX_HEADER_LEN + 4 + 8);
        assert_eq!(bytes.len(), prefix.encoded_len());
        assert_eq!(
            &bytes[..12],
            &[b'B', 0, 0, 11, 0, 0, 0, 3, 0, 5, 0, 0]
        );
        assert_eq!(&bytes[12..16], b"abc\0");
        assert_eq!(&bytes[16..24], b"12345\0\0\0");
    }

    #[test]
    fn test_pack_layout_lsb_first() {
        let prefix = ClientPrefix::new(b"abc".to_vec(), b"12345".to_vec());
        let bytes = prefix.pack(ByteOrder::LsbFirst).unwrap();

        assert_eq!(
            &bytes[..12],
            &[b'l', 0, 11, 0, 0, 0, 3, 0, 5, 0, 0, 0]
        );
    }

    #[test]
    fn test_pack_aligned_fields_add_no_padding() {
        let prefix = ClientPrefix::new(b"abcd".to_vec(), vec![7u8; 16]);
        let bytes = prefix.pack(ByteOrder::MsbFirst).unwrap();
        assert_eq!(bytes.len(), CLIENT_PREFIX_HEADER_LEN + 4 + 16);
    }

    #[test]
    fn test_pack_without_credentials() {
        let prefix = ClientPrefix::new(Vec::new(), Vec::new());
        let bytes = prefix.pack(ByteOrder::MsbFirst).unwrap();
        assert_eq!(bytes.len(), CLIENT_PREFIX_HEADER_LEN);
    }

    #[test]
    fn test_pack_rejects_oversize_name() {
        let prefix = ClientPrefix::new(vec![b'x'; 70_000], Vec::new());
        assert!(matches!(
            prefix.pack(ByteOrder::MsbFirst),
            Err(ProtocolError::Violation(_))
        ));
    }

    #[tokio::test]
    async fn test_header_recovers_lengths() {
        let prefix = ClientPrefix::new(b"abc".to_vec(), b"12345".to_vec());
        for order in [ByteOrder::MsbFirst, ByteOrder::LsbFirst] {
            let bytes = prefix.pack(order).unwrap();
            let mut stream = X11InStream::new(Cursor::new(bytes.to_vec()));
            let (parsed_order, parsed) = ClientPrefix::read_from(&mut stream).await.unwrap();
            assert_eq!(parsed_order, order);
            assert_eq!(parsed.auth_name.len(), 3);
            assert_eq!(parsed.auth_data.len(), 5);
            assert_eq!(parsed, prefix);
        }
    }

    #[tokio::test]
    async fn test_write_to_matches_pack() {
        let prefix = ClientPrefix::new(b"abc".to_vec(), b"12345".to_vec());
        for order in [ByteOrder::MsbFirst, ByteOrder::LsbFirst] {
            let mut buffer = Vec::new();
            let mut out = X11OutStream::with_order(&mut buffer, order);
            prefix.write_to(&mut out).unwrap();
            out.flush().await.unwrap();
            assert_eq!(buffer, prefix.pack(order).unwrap().to_vec());
        }
    }

    #[test]
    fn test_write_to_rejects_oversize_data() {
        let prefix = ClientPrefix::new(Vec::new(), vec![0u8; 70_000]);
        let mut out = X11OutStream::new(Vec::new());
        assert!(prefix.write_to(&mut out).is_err());
        assert_eq!(out.buffered(), 0);
    }

    #[tokio::test]
    async fn test_read_rejects_unknown_marker() {
        let mut bytes = ClientPrefix::new(Vec::new(), Vec::new())
            .pack(ByteOrder::MsbFirst)
            .unwrap()
            .to_vec();
        bytes[0] = b'X';
        let mut stream = X11InStream::new(Cursor::new(bytes));
        assert!(matches!(
            ClientPrefix::read_from(&mut stream).await,
            Err(ProtocolError::Violation(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let prefix = ClientPrefix::new(b"MIT-MAGIC-COOKIE-1".to_vec(), b"secret!".to_vec());
        let rendered = format!("{:?}", prefix);
        assert!(rendered.contains("MIT-MAGIC-COOKIE-1"));
        assert!(!rendered.contains("secret!"));
    }
}
