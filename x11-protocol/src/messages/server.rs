//! Server-to-client connection-setup messages.

use super::types::{pad, ByteOrder, SetupStatus};
use crate::error::ProtocolError;
use crate::io::{X11InStream, X11OutStream};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

/// Size of the fixed part of the setup response.
pub const SETUP_RESPONSE_HEADER_LEN: usize = 8;

/// Fixed header of the server's reply to the client prefix.
///
/// # Wire Format
///
/// - 1 byte: status (0 = Failed, 1 = Success, 2 = Authenticate)
/// - 1 byte: reason length (Failed only)
/// - 2 bytes: protocol major version
/// - 2 bytes: protocol minor version
/// - 2 bytes: length of the additional data in 4-byte units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupResponseHeader {
    /// Outcome of the setup.
    pub status: SetupStatus,
    /// Length of the reason string for `Failed`.
    pub reason_len: u8,
    /// Protocol major version the server speaks.
    pub major_version: u16,
    /// Protocol minor version the server speaks.
    pub minor_version: u16,
    /// Length of the tail in 4-byte units.
    pub additional_words: u16,
}

impl SetupResponseHeader {
    /// Number of bytes that follow the header.
    #[must_use]
    pub fn additional_len(&self) -> usize {
        self.additional_words as usize * 4
    }

    /// Read the header in the stream's byte order.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TruncatedResponse`] if fewer than 8 bytes arrive,
    /// [`ProtocolError::Violation`] if the status byte is unknown.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut X11InStream<R>,
    ) -> Result<Self, ProtocolError> {
        let got = stream.prefetch(SETUP_RESPONSE_HEADER_LEN).await?;
        if got < SETUP_RESPONSE_HEADER_LEN {
            return Err(ProtocolError::TruncatedResponse {
                expected: SETUP_RESPONSE_HEADER_LEN,
                got,
            });
        }

        let status = stream.read_u8().await?;
        let status = SetupStatus::from_u8(status)
            .ok_or_else(|| ProtocolError::Violation(format!("invalid setup status {status}")))?;
        Ok(Self {
            status,
            reason_len: stream.read_u8().await?,
            major_version: stream.read_u16().await?,
            minor_version: stream.read_u16().await?,
            additional_words: stream.read_u16().await?,
        })
    }

    /// Buffer the header on `stream`.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut X11OutStream<W>) {
        stream.write_u8(self.status.as_u8());
        stream.write_u8(self.reason_len);
        stream.write_u16(self.major_version);
        stream.write_u16(self.minor_version);
        stream.write_u16(self.additional_words);
    }
}

/// Complete setup response: header plus exactly `additional_len()` bytes.
///
/// The additional data is a reason string for `Failed` and `Authenticate`,
/// and the connection setup block for `Success`. The block is kept opaque
/// here; [`SetupSummary`] decodes its fixed head on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupResponse {
    /// Fixed 8-byte header.
    pub header: SetupResponseHeader,
    /// Reason text or setup block.
    pub additional: Bytes,
}

impl SetupResponse {
    /// Read a setup response.
    ///
    /// The 8-byte header is read first; only then is the tail length known
    /// and exactly that many bytes are read.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::TruncatedResponse`] if the stream ends early,
    /// [`ProtocolError::Violation`] if the status byte is unknown.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut X11InStream<R>,
    ) -> Result<Self, ProtocolError> {
        let header = SetupResponseHeader::read_from(stream).await?;

        let expected = header.additional_len();
        let got = stream.prefetch(expected).await?;
        if got < expected {
            return Err(ProtocolError::TruncatedResponse { expected, got });
        }
        let mut additional = vec![0u8; expected];
        stream.read_bytes(&mut additional).await?;

        Ok(Self {
            header,
            additional: Bytes::from(additional),
        })
    }

    /// Buffer the whole response on `stream`.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut X11OutStream<W>) {
        self.header.write_to(stream);
        stream.write_bytes(&self.additional);
    }

    /// Build a `Failed` response carrying `reason`, padded to 4 bytes.
    #[must_use]
    pub fn failed(reason: &str, major_version: u16, minor_version: u16) -> Self {
        let reason = &reason.as_bytes()[..reason.len().min(u8::MAX as usize)];
        let mut additional = reason.to_vec();
        additional.resize(reason.len() + pad(reason.len()), 0);
        Self {
            header: SetupResponseHeader {
                status: SetupStatus::Failed,
                reason_len: reason.len() as u8,
                major_version,
                minor_version,
                additional_words: (additional.len() / 4) as u16,
            },
            additional: Bytes::from(additional),
        }
    }

    /// Status from the header.
    #[must_use]
    pub fn status(&self) -> SetupStatus {
        self.header.status
    }

    /// Human-readable reason attached to a `Failed` or `Authenticate` reply.
    ///
    /// For `Failed` the header's reason length bounds the text; for
    /// `Authenticate` the whole tail is used minus trailing NUL padding.
    /// Returns `None` for `Success`.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        let text = match self.header.status {
            SetupStatus::Success => return None,
            SetupStatus::Failed => {
                let len = (self.header.reason_len as usize).min(self.additional.len());
                &self.additional[..len]
            }
            SetupStatus::AuthenticateMore => {
                let end = self
                    .additional
                    .iter()
                    .rposition(|&b| b != 0)
                    .map_or(0, |i| i + 1);
                &self.additional[..end]
            }
        };
        Some(String::from_utf8_lossy(text).into_owned())
    }

    /// Decode the fixed head of a `Success` setup block.
    #[must_use]
    pub fn summary(&self, order: ByteOrder) -> Option<SetupSummary> {
        match self.header.status {
            SetupStatus::Success => SetupSummary::parse(&self.additional, order),
            _ => None,
        }
    }
}

/// Fixed head of the setup block sent with a `Success` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSummary {
    /// Vendor release number.
    pub release_number: u32,
    /// Base of the client's resource ID range.
    pub resource_id_base: u32,
    /// Mask of the client's resource ID range.
    pub resource_id_mask: u32,
    /// Size of the motion history buffer.
    pub motion_buffer_size: u32,
    /// Longest request accepted, in 4-byte units.
    pub maximum_request_length: u16,
    /// Number of screens.
    pub roots: u8,
    /// Number of pixmap formats.
    pub pixmap_formats: u8,
    /// Image byte order (0 = LSB first, 1 = MSB first).
    pub image_byte_order: u8,
    /// Smallest keycode.
    pub min_keycode: u8,
    /// Largest keycode.
    pub max_keycode: u8,
    /// Vendor string.
    pub vendor: String,
}

/// Bytes before the vendor string in the setup block.
const SETUP_BLOCK_FIXED_LEN: usize = 32;

impl SetupSummary {
    /// Parse the head of a setup block. Returns `None` if `data` is too short.
    #[must_use]
    pub fn parse(data: &[u8], order: ByteOrder) -> Option<Self> {
        if data.len() < SETUP_BLOCK_FIXED_LEN {
            return None;
        }
        let u32_at = |at: usize| order.u32_from([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let u16_at = |at: usize| order.u16_from([data[at], data[at + 1]]);

        let vendor_len = u16_at(16) as usize;
        let vendor = data.get(SETUP_BLOCK_FIXED_LEN..SETUP_BLOCK_FIXED_LEN + vendor_len)?;

        Some(Self {
            release_number: u32_at(0),
            resource_id_base: u32_at(4),
            resource_id_mask: u32_at(8),
            motion_buffer_size: u32_at(12),
            maximum_request_length: u16_at(18),
            roots: data[20],
            pixmap_formats: data[21],
            image_byte_order: data[22],
            min_keycode: data[26],
            max_keycode: data[27],
            vendor: String::from_utf8_lossy(vendor).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn parse(bytes: Vec<u8>) -> Result<SetupResponse, ProtocolError> {
        let mut stream = X11InStream::new(Cursor::new(bytes));
        SetupResponse::read_from(&mut stream).await
    }

    #[tokio::test]
    async fn test_success_reads_exact_tail() {
        let mut bytes = vec![1, 0, 0, 11, 0, 0, 0, 3];
        bytes.extend_from_slice(&[0xAA; 12]);
        // Trailing bytes belong to the next message and must stay unread.
        bytes.extend_from_slice(&[0xBB; 4]);

        let mut stream = X11InStream::new(Cursor::new(bytes));
        let response = SetupResponse::read_from(&mut stream).await.unwrap();
        assert_eq!(response.status(), SetupStatus::Success);
        assert_eq!(response.header.major_version, 11);
        assert_eq!(response.additional.len(), 12);
        assert_eq!(response.reason(), None);

        let mut rest = [0u8; 4];
        stream.read_bytes(&mut rest).await.unwrap();
        assert_eq!(rest, [0xBB; 4]);
    }

    #[tokio::test]
    async fn test_failed_reason() {
        let mut bytes = vec![0, 5, 0, 11, 0, 0, 0, 2];
        bytes.extend_from_slice(b"nope!\0\0\0");
        let response = parse(bytes).await.unwrap();
        assert_eq!(response.status(), SetupStatus::Failed);
        assert_eq!(response.reason().as_deref(), Some("nope!"));
    }

    #[tokio::test]
    async fn test_authenticate_reason_strips_padding() {
        let mut bytes = vec![2, 0, 0, 0, 0, 0, 0, 2];
        bytes.extend_from_slice(b"more\0\0\0\0");
        let response = parse(bytes).await.unwrap();
        assert_eq!(response.status(), SetupStatus::AuthenticateMore);
        assert_eq!(response.reason().as_deref(), Some("more"));
    }

    #[tokio::test]
    async fn test_lsb_first_header() {
        let mut stream = X11InStream::with_order(
            Cursor::new(vec![1, 0, 11, 0, 0, 0, 1, 0, 1, 2, 3, 4]),
            ByteOrder::LsbFirst,
        );
        let response = SetupResponse::read_from(&mut stream).await.unwrap();
        assert_eq!(response.header.major_version, 11);
        assert_eq!(response.header.additional_words, 1);
        assert_eq!(&response.additional[..], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let err = parse(vec![1, 0, 0, 11]).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TruncatedResponse { expected: 8, got: 4 }
        ));
    }

    #[tokio::test]
    async fn test_truncated_tail() {
        let mut bytes = vec![1, 0, 0, 11, 0, 0, 0, 3];
        bytes.extend_from_slice(&[0; 7]);
        let err = parse(bytes).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TruncatedResponse { expected: 12, got: 7 }
        ));
    }

    #[tokio::test]
    async fn test_header_reads_in_stream_order() {
        let mut stream = X11InStream::with_order(
            Cursor::new(vec![0, 5, 11, 0, 0, 0, 2, 0]),
            ByteOrder::LsbFirst,
        );
        let header = SetupResponseHeader::read_from(&mut stream).await.unwrap();
        assert_eq!(header.status, SetupStatus::Failed);
        assert_eq!(header.reason_len, 5);
        assert_eq!(header.major_version, 11);
        assert_eq!(header.additional_len(), 8);
        assert!(stream.at_eof().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_status() {
        let err = parse(vec![7, 0, 0, 11, 0, 0, 0, 0]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Violation(_)));
    }

    #[tokio::test]
    async fn test_failed_builder_round_trip() {
        let response = SetupResponse::failed("nope!", 11, 0);
        assert_eq!(response.header.additional_words, 2);

        let mut buffer = Vec::new();
        let mut out = X11OutStream::new(&mut buffer);
        response.write_to(&mut out);
        out.flush().await.unwrap();

        assert_eq!(parse(buffer).await.unwrap(), response);
    }

    #[test]
    fn test_summary_parses_setup_block() {
        let vendor = b"Test Vendor";
        let mut data = Vec::new();
        data.extend_from_slice(&12_004_000u32.to_be_bytes());
        data.extend_from_slice(&0x0040_0000u32.to_be_bytes());
        data.extend_from_slice(&0x001F_FFFFu32.to_be_bytes());
        data.extend_from_slice(&256u32.to_be_bytes());
        data.extend_from_slice(&(vendor.len() as u16).to_be_bytes());
        data.extend_from_slice(&65_535u16.to_be_bytes());
        data.extend_from_slice(&[1, 7, 0, 0, 32, 32, 8, 255, 0, 0, 0, 0]);
        data.extend_from_slice(vendor);

        let summary = SetupSummary::parse(&data, ByteOrder::MsbFirst).unwrap();
        assert_eq!(summary.release_number, 12_004_000);
        assert_eq!(summary.resource_id_base, 0x0040_0000);
        assert_eq!(summary.resource_id_mask, 0x001F_FFFF);
        assert_eq!(summary.maximum_request_length, 65_535);
        assert_eq!(summary.roots, 1);
        assert_eq!(summary.pixmap_formats, 7);
        assert_eq!(summary.min_keycode, 8);
        assert_eq!(summary.max_keycode, 255);
        assert_eq!(summary.vendor, "Test Vendor");
    }

    #[test]
    fn test_summary_needs_fixed_head() {
        assert_eq!(SetupSummary::parse(&[0u8; 12], ByteOrder::MsbFirst), None);
    }
}
