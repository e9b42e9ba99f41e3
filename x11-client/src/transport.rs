//! Transport layer (Unix-domain and TCP) for X11 connections.
//!
//! Local displays are dialed over the Unix socket `<base><display>[.<screen>]`;
//! displays with a network protocol token (`tcp`, `inet`, `inet6`) over TCP
//! port `6000 + display`. Any other protocol token is refused before anything
//! is dialed.
//!
//! # Examples
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use x11_client::config::ConnectionConfig;
//! use x11_client::transport::Transport;
//! use x11_protocol::DisplayAddress;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let address = DisplayAddress::resolve(":0")?;
//! let cancel = CancellationToken::new();
//! let transport = Transport::connect(&address, &ConnectionConfig::default(), &cancel).await?;
//! println!("Connected to {}", transport.peer_endpoint());
//! # Ok(())
//! # }
//! ```

use crate::config::ConnectionConfig;
use crate::errors::XClientError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;
use x11_protocol::{DisplayAddress, TcpSocket, TransportKind, X11Socket};

#[cfg(unix)]
use x11_protocol::UnixSocket;

/// Network protocol tokens that are dialed over TCP. The empty token comes
/// from identifiers like `host/:0`.
const TCP_PROTOCOLS: &[&str] = &["tcp", "inet", "inet6", ""];

/// An established byte stream to an X server.
pub enum Transport {
    /// Local Unix-domain socket.
    #[cfg(unix)]
    Unix(UnixSocket),
    /// TCP socket with `TCP_NODELAY`.
    Tcp(TcpSocket),
}

impl Transport {
    /// Dial the display, bounded by the configured timeout and by `cancel`.
    ///
    /// # Errors
    ///
    /// - [`XClientError::UnsupportedTransport`] for an unknown protocol token
    /// - [`XClientError::DialFailed`] if the socket cannot be reached
    /// - [`XClientError::Timeout`] if the dial outlives the timeout
    /// - [`XClientError::Cancelled`] if `cancel` fires first
    pub async fn connect(
        address: &DisplayAddress,
        config: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, XClientError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        guarded(cancel, timeout, Self::dial(address, config)).await
    }

    /// Dial the display with no timeout or cancellation.
    pub async fn dial(
        address: &DisplayAddress,
        config: &ConnectionConfig,
    ) -> Result<Self, XClientError> {
        match address.transport() {
            TransportKind::Unix => Self::dial_unix(address, config).await,
            TransportKind::Network => {
                if !TCP_PROTOCOLS.contains(&address.protocol()) {
                    return Err(XClientError::UnsupportedTransport(
                        address.protocol().to_string(),
                    ));
                }
                let port = address.tcp_port(config.tcp_base_port).ok_or_else(|| {
                    XClientError::UnsupportedTransport(format!(
                        "display {} is beyond the TCP port range",
                        address.display()
                    ))
                })?;
                let socket = TcpSocket::connect(address.host(), port).await.map_err(|e| {
                    XClientError::DialFailed(format!("{}:{}: {}", address.host(), port, e))
                })?;
                tracing::info!("Connected via TCP to {}", socket.peer_endpoint());
                Ok(Transport::Tcp(socket))
            }
        }
    }

    #[cfg(unix)]
    async fn dial_unix(
        address: &DisplayAddress,
        config: &ConnectionConfig,
    ) -> Result<Self, XClientError> {
        let path = address.unix_socket_path(&config.unix_socket_base);
        let socket = UnixSocket::connect(&path)
            .await
            .map_err(|e| XClientError::DialFailed(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Connected via Unix socket {}", path.display());
        Ok(Transport::Unix(socket))
    }

    #[cfg(not(unix))]
    async fn dial_unix(
        address: &DisplayAddress,
        _config: &ConnectionConfig,
    ) -> Result<Self, XClientError> {
        Err(XClientError::UnsupportedTransport(
            address.protocol().to_string(),
        ))
    }

    /// The peer including port or path, for logging.
    pub fn peer_endpoint(&self) -> String {
        match self {
            #[cfg(unix)]
            Transport::Unix(socket) => socket.peer_endpoint(),
            Transport::Tcp(socket) => socket.peer_endpoint(),
        }
    }
}

/// Run `fut` until it completes, `cancel` fires, or `timeout` elapses.
///
/// Whichever loses is dropped, releasing any partially opened socket.
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<T, XClientError>
where
    F: Future<Output = Result<T, XClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(XClientError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => {
            result.map_err(|_| XClientError::Timeout(timeout))?
        }
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match &mut *self {
            #[cfg(unix)]
            Transport::Unix(socket) => Pin::new(socket).poll_read(cx, buf),
            Transport::Tcp(socket) => Pin::new(socket).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut *self {
            #[cfg(unix)]
            Transport::Unix(socket) => Pin::new(socket).poll_write(cx, buf),
            Transport::Tcp(socket) => Pin::new(socket).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            #[cfg(unix)]
            Transport::Unix(socket) => Pin::new(socket).poll_flush(cx),
            Transport::Tcp(socket) => Pin::new(socket).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            #[cfg(unix)]
            Transport::Unix(socket) => Pin::new(socket).poll_shutdown(cx),
            Transport::Tcp(socket) => Pin::new(socket).poll_shutdown(cx),
        }
    }
}
