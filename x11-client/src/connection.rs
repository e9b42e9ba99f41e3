//! An established X11 connection.
//!
//! A [`Connection`] is produced only by a successful handshake. It owns the
//! transport through the pump tasks and exposes message exchange through
//! channels; the transport itself is never handed out.

use crate::config::PumpConfig;
use crate::errors::XClientError;
use crate::messages::Message;
use crate::pump;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use x11_protocol::{ByteOrder, DisplayAddress, SetupResponse, SetupSummary};

/// Cloneable access to a connection's channels.
///
/// Handles stay usable from other tasks while the connection is open; after
/// it closes, `send` fails with [`XClientError::ConnectionClosed`] and `recv`
/// returns `None` once buffered messages are drained.
#[derive(Clone)]
pub struct ConnectionHandle {
    outbound: flume::Sender<Message>,
    inbound: flume::Receiver<Message>,
    errors: flume::Receiver<XClientError>,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Queue a message for transmission, waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has been closed.
    pub async fn send(&self, msg: Message) -> Result<(), XClientError> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(XClientError::ConnectionClosed),
            result = self.outbound.send_async(msg) => {
                result.map_err(|_| XClientError::ConnectionClosed)
            }
        }
    }

    /// Queue a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is full or the connection is closed.
    pub fn try_send(&self, msg: Message) -> Result<(), XClientError> {
        if self.shutdown.is_cancelled() {
            return Err(XClientError::ConnectionClosed);
        }
        self.outbound.try_send(msg).map_err(|e| match e {
            flume::TrySendError::Full(_) => {
                XClientError::Internal("outbound queue is full".to_string())
            }
            flume::TrySendError::Disconnected(_) => XClientError::ConnectionClosed,
        })
    }

    /// Next inbound message, or `None` once the connection is closed and
    /// drained.
    pub async fn recv(&self) -> Option<Message> {
        self.inbound.recv_async().await.ok()
    }

    /// Inbound messages as an async stream.
    pub fn messages(&self) -> flume::r#async::RecvStream<'static, Message> {
        self.inbound.clone().into_stream()
    }

    /// Errors reported by the pump.
    #[must_use]
    pub fn errors(&self) -> &flume::Receiver<XClientError> {
        &self.errors
    }

    /// Returns true once shutdown has been signalled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Everything a successful handshake leaves behind.
pub(crate) struct Established<R, W> {
    pub reader: R,
    /// Bytes read past the setup response.
    pub leftover: Bytes,
    pub writer: W,
    pub setup: SetupResponse,
    pub address: DisplayAddress,
    pub order: ByteOrder,
}

/// An authenticated connection with its pump running.
///
/// Dropping the connection signals shutdown; [`close`](Self::close)
/// additionally waits for the pump tasks to finish.
pub struct Connection {
    handle: ConnectionHandle,
    setup: SetupResponse,
    address: DisplayAddress,
    order: ByteOrder,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    pub(crate) fn start<R, W>(
        parts: Established<R, W>,
        config: &PumpConfig,
        shutdown: CancellationToken,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let Established {
            reader,
            leftover,
            writer,
            setup,
            address,
            order,
        } = parts;
        let ends = pump::spawn(reader, leftover, writer, config, shutdown.clone());
        Self {
            handle: ConnectionHandle {
                outbound: ends.outbound,
                inbound: ends.inbound,
                errors: ends.errors,
                shutdown,
            },
            setup,
            address,
            order,
            tasks: ends.tasks,
        }
    }

    /// A handle for use from other tasks.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// The server's setup response.
    #[must_use]
    pub fn setup(&self) -> &SetupResponse {
        &self.setup
    }

    /// Decoded head of the setup block, if it is long enough.
    #[must_use]
    pub fn summary(&self) -> Option<SetupSummary> {
        self.setup.summary(self.order)
    }

    /// The display this connection was made to.
    #[must_use]
    pub fn address(&self) -> &DisplayAddress {
        &self.address
    }

    /// The byte order negotiated for this connection.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Queue a message, as [`ConnectionHandle::send`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection has been closed.
    pub async fn send(&self, msg: Message) -> Result<(), XClientError> {
        self.handle.send(msg).await
    }

    /// Next inbound message, as [`ConnectionHandle::recv`].
    pub async fn recv(&self) -> Option<Message> {
        self.handle.recv().await
    }

    /// Inbound messages as an async stream.
    pub fn messages(&self) -> flume::r#async::RecvStream<'static, Message> {
        self.handle.messages()
    }

    /// Errors reported by the pump.
    #[must_use]
    pub fn errors(&self) -> &flume::Receiver<XClientError> {
        self.handle.errors()
    }

    /// Signal shutdown and wait for the pump tasks to exit.
    ///
    /// Messages still queued for transmission are discarded. The transport
    /// is shut down by the transmit task after the signal.
    ///
    /// # Errors
    ///
    /// Returns [`XClientError::Internal`] if a pump task panicked.
    pub async fn close(mut self) -> Result<(), XClientError> {
        self.handle.shutdown.cancel();
        let tasks = std::mem::take(&mut self.tasks);
        let mut result = Ok(());
        for task in tasks {
            if let Err(e) = task.await {
                result = Err(XClientError::Internal(format!("pump task panicked: {e}")));
            }
        }
        tracing::debug!("Connection to {} closed", self.address);
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handle.shutdown.cancel();
    }
}
