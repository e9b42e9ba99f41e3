//! Sockets an X11 connection can run over.
//!
//! Local displays are reached over a Unix-domain socket under
//! `/tmp/.X11-unix`; remote displays over TCP. Both implement [`X11Socket`]
//! so the transport layer only sees a byte stream with a printable peer.
//!
//! ```no_run
//! use x11_protocol::socket::{TcpSocket, X11Socket};
//!
//! # async fn example() -> std::io::Result<()> {
//! let socket = TcpSocket::connect("remote.example", 6000).await?;
//! println!("connected to {}", socket.peer_endpoint());
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::net::UnixStream;

/// A connected byte stream to an X server.
pub trait X11Socket: AsyncRead + AsyncWrite + Send + Unpin {
    /// The peer for log lines, e.g. `10.0.0.1:6000` or
    /// `unix:/tmp/.X11-unix/X0`.
    fn peer_endpoint(&self) -> String;
}

/// Forwards the tokio I/O traits of `$socket` to its `stream` field.
macro_rules! forward_async_io {
    ($socket:ty) => {
        impl AsyncRead for $socket {
            fn poll_read(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
            }
        }

        impl AsyncWrite for $socket {
            fn poll_write(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
            }

            fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Pin::new(&mut self.get_mut().stream).poll_flush(cx)
            }

            fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
            }
        }
    };
}

/// TCP connection to `host:6000 + display`, with `TCP_NODELAY` set.
pub struct TcpSocket {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpSocket {
    /// Resolve `host` and connect to `port`.
    ///
    /// # Errors
    ///
    /// Any resolution or connection failure from the operating system.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }
}

impl X11Socket for TcpSocket {
    fn peer_endpoint(&self) -> String {
        self.peer.to_string()
    }
}

forward_async_io!(TcpSocket);

/// Unix-domain connection to a local display.
#[cfg(unix)]
pub struct UnixSocket {
    stream: UnixStream,
    path: PathBuf,
}

#[cfg(unix)]
impl UnixSocket {
    /// Connect to the socket file at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, access is denied or nothing listens.
    pub async fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path).await?;
        Ok(Self { stream, path })
    }
}

#[cfg(unix)]
impl X11Socket for UnixSocket {
    fn peer_endpoint(&self) -> String {
        format!("unix:{}", self.path.display())
    }
}

#[cfg(unix)]
forward_async_io!(UnixSocket);
