//! Buffered I/O streams for X11 protocol communication.
//!
//! Both streams carry the connection's [`ByteOrder`]; every multi-byte integer
//! read or written through them uses that order. The order is chosen once when
//! the stream is created and never changes, so one connection cannot mix
//! orders.
//!
//! # Examples
//!
//! ```no_run
//! use x11_protocol::io::{X11InStream, X11OutStream};
//! use x11_protocol::messages::ByteOrder;
//!
//! # async fn example<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(socket: S) -> std::io::Result<()> {
//! let (reader, writer) = tokio::io::split(socket);
//!
//! let mut output = X11OutStream::with_order(writer, ByteOrder::LsbFirst);
//! output.write_u8(b'l');
//! output.write_u8(0);
//! output.write_u16(11);
//! output.flush().await?;
//!
//! let mut input = X11InStream::with_order(reader, ByteOrder::LsbFirst);
//! let status = input.read_u8().await?;
//! # Ok(())
//! # }
//! ```

use crate::messages::ByteOrder;
use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const DEFAULT_CAPACITY: usize = 8192;

/// Buffered input stream for reading X11 protocol data.
///
/// The stream maintains an internal buffer that is filled on demand. Methods
/// like `read_u16()` read from this buffer when possible, only performing I/O
/// when the buffer needs refilling.
///
/// # Examples
///
/// ```no_run
/// use x11_protocol::io::X11InStream;
/// # async fn example<R: tokio::io::AsyncRead + Unpin>(reader: R) -> std::io::Result<()> {
/// let mut stream = X11InStream::new(reader);
///
/// let status = stream.read_u8().await?;
/// let reason_len = stream.read_u8().await?;
/// let major = stream.read_u16().await?;
/// # Ok(())
/// # }
/// ```
pub struct X11InStream<R> {
    reader: R,
    buffer: BytesMut,
    order: ByteOrder,
}

impl<R: AsyncRead + Unpin> X11InStream<R> {
    /// Create an MSB-first input stream with the default buffer size (8KB).
    ///
    /// MSB-first is the order of the authority file format.
    pub fn new(reader: R) -> Self {
        Self::with_order(reader, ByteOrder::MsbFirst)
    }

    /// Create an input stream decoding integers in `order`.
    pub fn with_order(reader: R, order: ByteOrder) -> Self {
        Self::with_capacity(reader, order, DEFAULT_CAPACITY)
    }

    /// Create an input stream with a specific initial buffer capacity.
    pub fn with_capacity(reader: R, order: ByteOrder, capacity: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(capacity),
            order,
        }
    }

    /// The byte order this stream decodes with.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Ensure at least `n` bytes are available in the buffer.
    ///
    /// Returns `UnexpectedEof` if the reader ends before `n` bytes arrive.
    async fn ensure_bytes(&mut self, n: usize) -> std::io::Result<()> {
        while self.buffer.len() < n {
            let bytes_read = self.reader.read_buf(&mut self.buffer).await?;
            if bytes_read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {} bytes, got {}", n, self.buffer.len()),
                ));
            }
        }
        Ok(())
    }

    /// Read a single byte (u8).
    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        self.ensure_bytes(1).await?;
        Ok(self.buffer.get_u8())
    }

    /// Read a 16-bit unsigned integer in the stream's byte order.
    pub async fn read_u16(&mut self) -> std::io::Result<u16> {
        self.ensure_bytes(2).await?;
        Ok(match self.order {
            ByteOrder::MsbFirst => self.buffer.get_u16(),
            ByteOrder::LsbFirst => self.buffer.get_u16_le(),
        })
    }

    /// Read exactly `buf.len()` bytes into the provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if the reader ends before the buffer is filled.
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.ensure_bytes(buf.len()).await?;
        self.buffer.copy_to_slice(buf);
        Ok(())
    }

    /// Read up to `buf.len()` bytes, stopping early only at end of stream.
    ///
    /// Returns the number of bytes copied. Unlike [`read_bytes`](Self::read_bytes)
    /// an early end of stream is not an error; callers compare the count with
    /// what they expected.
    pub async fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.prefetch(buf.len()).await?;
        self.buffer.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }

    /// Buffer up to `n` bytes without consuming them.
    ///
    /// Returns how many of the `n` bytes are now buffered; fewer than `n`
    /// means the stream ended. Reads of at most that many bytes then cannot
    /// fail.
    pub async fn prefetch(&mut self, n: usize) -> std::io::Result<usize> {
        while self.buffer.len() < n {
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                break;
            }
        }
        Ok(self.buffer.len().min(n))
    }

    /// Returns `true` when the stream is exhausted with nothing left buffered.
    ///
    /// This may perform one read to find out.
    pub async fn at_eof(&mut self) -> std::io::Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(false);
        }
        Ok(self.reader.read_buf(&mut self.buffer).await? == 0)
    }

    /// Skip `n` bytes in the stream.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use x11_protocol::io::X11InStream;
    /// # async fn example<R: tokio::io::AsyncRead + Unpin>(mut stream: X11InStream<R>) -> std::io::Result<()> {
    /// // Skip 2 bytes of padding
    /// stream.skip(2).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn skip(&mut self, n: usize) -> std::io::Result<()> {
        self.ensure_bytes(n).await?;
        self.buffer.advance(n);
        Ok(())
    }

    /// Consume the stream, returning the reader and any bytes already buffered.
    ///
    /// The buffered bytes were read from the reader but not consumed; they
    /// precede whatever the reader yields next.
    pub fn into_parts(self) -> (R, BytesMut) {
        (self.reader, self.buffer)
    }
}

/// Buffered output stream for writing X11 protocol data.
///
/// Data is buffered internally and sent by [`flush()`](Self::flush) or
/// [`send_once()`](Self::send_once).
///
/// # Important: Flushing
///
/// Dropping the stream without flushing loses any buffered data.
pub struct X11OutStream<W> {
    writer: W,
    buffer: BytesMut,
    order: ByteOrder,
}

impl<W: AsyncWrite + Unpin> X11OutStream<W> {
    /// Create an MSB-first output stream with the default buffer size (8KB).
    pub fn new(writer: W) -> Self {
        Self::with_order(writer, ByteOrder::MsbFirst)
    }

    /// Create an output stream encoding integers in `order`.
    pub fn with_order(writer: W, order: ByteOrder) -> Self {
        Self::with_capacity(writer, order, DEFAULT_CAPACITY)
    }

    /// Create an output stream with a specific initial buffer capacity.
    pub fn with_capacity(writer: W, order: ByteOrder, capacity: usize) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(capacity),
            order,
        }
    }

    /// The byte order this stream encodes with.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Write a single byte (u8).
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Write a 16-bit unsigned integer in the stream's byte order.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use x11_protocol::io::X11OutStream;
    /// # fn example<W: tokio::io::AsyncWrite + Unpin>(mut stream: X11OutStream<W>) {
    /// stream.write_u16(11); // protocol major version
    /// stream.write_u16(0); // protocol minor version
    /// # }
    /// ```
    pub fn write_u16(&mut self, value: u16) {
        self.order.put_u16(&mut self.buffer, value);
    }

    /// Write a byte slice to the buffer.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write `n` zero bytes.
    pub fn write_padding(&mut self, n: usize) {
        self.buffer.put_bytes(0, n);
    }

    /// Flush all buffered data to the underlying writer.
    ///
    /// Partial writes are retried until everything is written.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        self.writer.flush().await
    }

    /// Hand the buffered data to the writer in a single write call.
    ///
    /// Returns how many bytes the writer accepted. A partial write is not
    /// retried: the unsent remainder is discarded and the caller decides what
    /// a short count means.
    pub async fn send_once(&mut self) -> std::io::Result<usize> {
        let written = if self.buffer.is_empty() {
            0
        } else {
            self.writer.write(&self.buffer).await?
        };
        self.buffer.clear();
        self.writer.flush().await?;
        Ok(written)
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the stream and return the underlying writer.
    ///
    /// **Warning:** Any buffered data will be lost.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[tokio::test]
    async fn test_read_u16_both_orders() {
        let data = vec![0x12, 0x34];
        let mut msb = X11InStream::new(Cursor::new(data.clone()));
        assert_eq!(msb.read_u16().await.unwrap(), 0x1234);

        let mut lsb = X11InStream::with_order(Cursor::new(data), ByteOrder::LsbFirst);
        assert_eq!(lsb.read_u16().await.unwrap(), 0x3412);
    }

    #[tokio::test]
    async fn test_prefetch_does_not_consume() {
        let mut stream = X11InStream::new(Cursor::new(vec![1u8, 2, 3]));
        assert_eq!(stream.prefetch(2).await.unwrap(), 2);
        assert_eq!(stream.prefetch(8).await.unwrap(), 3);
        assert_eq!(stream.read_u8().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_bytes_and_skip() {
        let data = vec![1, 2, 3, 4, 5];
        let mut stream = X11InStream::new(Cursor::new(data));

        let mut buf = [0u8; 2];
        stream.read_bytes(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2]);
        stream.skip(2).await.unwrap();
        assert_eq!(stream.read_u8().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_read_eof() {
        let mut stream = X11InStream::new(Cursor::new(vec![1u8]));
        stream.read_u8().await.unwrap();

        let result = stream.read_u8().await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_fill_reports_short_count() {
        let mut stream = X11InStream::new(Cursor::new(vec![9u8, 8, 7]));
        let mut buf = [0u8; 8];
        let n = stream.fill(&mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[9, 8, 7]);
    }

    #[tokio::test]
    async fn test_at_eof() {
        let mut stream = X11InStream::new(Cursor::new(vec![1u8]));
        assert!(!stream.at_eof().await.unwrap());
        stream.read_u8().await.unwrap();
        assert!(stream.at_eof().await.unwrap());
    }

    #[tokio::test]
    async fn test_into_parts_keeps_buffered_bytes() {
        let mut stream = X11InStream::new(Cursor::new(vec![1u8, 2, 3, 4]));
        assert_eq!(stream.read_u8().await.unwrap(), 1);
        let (_reader, rest) = stream.into_parts();
        assert_eq!(&rest[..], &[2, 3, 4]);
    }

    #[tokio::test]
    async fn test_write_integers_in_order() {
        let mut buffer = Vec::new();
        let mut stream = X11OutStream::with_order(&mut buffer, ByteOrder::LsbFirst);
        stream.write_u8(0x6C);
        stream.write_u16(0x1234);
        stream.write_u16(0xBEEF);
        stream.flush().await.unwrap();

        assert_eq!(buffer, vec![0x6C, 0x34, 0x12, 0xEF, 0xBE]);
    }

    #[tokio::test]
    async fn test_write_padding() {
        let mut buffer = Vec::new();
        let mut stream = X11OutStream::new(&mut buffer);
        stream.write_bytes(b"abc");
        stream.write_padding(1);
        assert_eq!(stream.buffered(), 4);
        stream.flush().await.unwrap();

        assert_eq!(buffer, b"abc\0");
    }

    /// Writer that accepts at most `limit` bytes per call.
    struct Trickle {
        limit: usize,
        sink: Vec<u8>,
    }

    impl AsyncWrite for Trickle {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let n = buf.len().min(self.limit);
            self.sink.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_send_once_does_not_retry() {
        let mut stream = X11OutStream::new(Trickle {
            limit: 3,
            sink: Vec::new(),
        });
        stream.write_bytes(b"0123456789");
        let written = stream.send_once().await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(stream.buffered(), 0);
        assert_eq!(stream.into_inner().sink, b"012");
    }

    #[tokio::test]
    async fn test_flush_retries_partial_writes() {
        let mut stream = X11OutStream::new(Trickle {
            limit: 3,
            sink: Vec::new(),
        });
        stream.write_bytes(b"0123456789");
        stream.flush().await.unwrap();
        assert_eq!(stream.into_inner().sink, b"0123456789");
    }
}
