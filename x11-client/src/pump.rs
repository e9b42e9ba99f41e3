//! Connection pump: transmit loop, receive loop, and error reporting.
//!
//! Three tasks share one transport after a successful handshake. Each owns
//! exactly one end of each channel it touches and drops it when it exits,
//! so every channel is closed exactly once. All of them watch the same
//! shutdown token.

use crate::config::PumpConfig;
use crate::errors::XClientError;
use crate::messages::Message;
use crate::protocol_trace;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Application-facing channel ends of a running pump.
pub(crate) struct PumpEnds {
    pub outbound: flume::Sender<Message>,
    pub inbound: flume::Receiver<Message>,
    pub errors: flume::Receiver<XClientError>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Start the three pump tasks.
///
/// `leftover` holds bytes that arrived behind the setup response; they are
/// delivered as the first inbound message.
pub(crate) fn spawn<R, W>(
    reader: R,
    leftover: Bytes,
    writer: W,
    config: &PumpConfig,
    shutdown: CancellationToken,
) -> PumpEnds
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (outbound_tx, outbound_rx) = flume::bounded(config.outbound_capacity);
    let (inbound_tx, inbound_rx) = flume::bounded(config.inbound_capacity);
    let (internal_tx, internal_rx) = flume::bounded(config.error_capacity);
    let (errors_tx, errors_rx) = flume::bounded(config.error_capacity);

    let transmit = tokio::spawn(transmit_loop(
        writer,
        outbound_rx,
        internal_tx.clone(),
        shutdown.clone(),
    ));
    let receive = tokio::spawn(receive_loop(
        reader,
        leftover,
        config.read_buffer_size,
        inbound_tx,
        internal_tx,
        shutdown.clone(),
    ));
    let report = tokio::spawn(report_loop(internal_rx, errors_tx, shutdown));

    PumpEnds {
        outbound: outbound_tx,
        inbound: inbound_rx,
        errors: errors_rx,
        tasks: vec![transmit, receive, report],
    }
}

/// Post an error for the report task unless shutdown comes first.
async fn post(
    errors: &flume::Sender<XClientError>,
    shutdown: &CancellationToken,
    err: XClientError,
) {
    select! {
        biased;
        _ = shutdown.cancelled() => {}
        _ = errors.send_async(err) => {}
    }
}

/// Write each queued message with one write call, in submission order.
async fn transmit_loop<W>(
    mut writer: W,
    outbound: flume::Receiver<Message>,
    errors: flume::Sender<XClientError>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = select! {
            biased;
            _ = shutdown.cancelled() => break,
            msg = outbound.recv_async() => match msg {
                Ok(msg) => msg,
                // Every sender is gone; nothing more can be queued.
                Err(_) => break,
            },
        };

        protocol_trace::out_msg("Message", &format!("length={}", msg.length));
        protocol_trace::hexdump("  >", &msg.payload, 64);

        let result = select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = writer.write(&msg.payload) => result,
        };
        match result {
            Ok(written) if written < msg.length => {
                post(
                    &errors,
                    &shutdown,
                    XClientError::ShortWrite {
                        written,
                        expected: msg.length,
                    },
                )
                .await;
            }
            Ok(written) => {
                tracing::trace!("Sent {} bytes", written);
            }
            Err(e) => {
                post(&errors, &shutdown, XClientError::PumpTransport(e.to_string())).await;
                break;
            }
        }
    }

    // Queued but unsent messages are discarded.
    drop(outbound);
    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Transport shutdown failed: {}", e);
    }
}

/// Turn every non-empty read into one inbound message.
async fn receive_loop<R>(
    mut reader: R,
    leftover: Bytes,
    read_buffer_size: usize,
    inbound: flume::Sender<Message>,
    errors: flume::Sender<XClientError>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    if !leftover.is_empty() && !deliver(&inbound, &shutdown, Message::new(leftover)).await {
        return;
    }

    let mut chunk = vec![0u8; read_buffer_size];
    loop {
        let result = select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = reader.read(&mut chunk) => result,
        };
        match result {
            Ok(0) => {
                tracing::debug!("Server closed the connection");
                break;
            }
            Ok(n) => {
                protocol_trace::in_msg("Message", &format!("length={}", n));
                protocol_trace::hexdump("  <", &chunk[..n], 64);
                let msg = Message::new(Bytes::copy_from_slice(&chunk[..n]));
                if !deliver(&inbound, &shutdown, msg).await {
                    break;
                }
            }
            Err(e) => {
                post(&errors, &shutdown, XClientError::PumpTransport(e.to_string())).await;
                break;
            }
        }
    }
}

/// Returns false once nobody can receive any more messages.
async fn deliver(
    inbound: &flume::Sender<Message>,
    shutdown: &CancellationToken,
    msg: Message,
) -> bool {
    select! {
        biased;
        _ = shutdown.cancelled() => false,
        result = inbound.send_async(msg) => result.is_ok(),
    }
}

/// Log pump errors and forward them to the application without blocking.
async fn report_loop(
    internal: flume::Receiver<XClientError>,
    public: flume::Sender<XClientError>,
    shutdown: CancellationToken,
) {
    loop {
        let err = select! {
            biased;
            _ = shutdown.cancelled() => break,
            err = internal.recv_async() => match err {
                Ok(err) => err,
                Err(_) => break,
            },
        };

        tracing::warn!("Connection pump error: {}", err);
        if let Err(flume::TrySendError::Full(err)) = public.try_send(err) {
            tracing::warn!("Error channel full, dropping: {}", err);
        }
    }
}
