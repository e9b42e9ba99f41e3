//! X11 connection-setup exchange.
//!
//! Connection setup is a single round trip:
//!
//! 1. **Client prefix** - the client announces its byte order, protocol
//!    version and authorization credentials in one write
//! 2. **Setup response** - the server answers Success, Failed or
//!    Authenticate, followed by the setup block or a reason string
//!
//! [`HandshakeState`] names every phase an attempt passes through, from
//! resolving the display name to one of the four terminal outcomes. The
//! driver that walks these states lives in the client crate; this module
//! supplies the states and the two wire steps.
//!
//! # Error Handling
//!
//! The prefix is written with exactly one write call. A transport that
//! accepts fewer bytes fails the attempt with
//! [`ProtocolError::ShortWrite`]; the remainder is never retried.

use crate::error::ProtocolError;
use crate::io::{X11InStream, X11OutStream};
use crate::messages::{ClientPrefix, SetupResponse};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Phase of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Parsing the display identifier.
    Resolving,
    /// Looking up credentials in the authority file.
    Authenticating,
    /// Dialing the transport.
    Connecting,
    /// Writing the client prefix.
    SendingPrefix,
    /// Waiting for the server's setup response.
    AwaitingSetupResponse,
    /// The server accepted the connection.
    Established,
    /// The server refused the connection.
    Rejected,
    /// The server demands further authentication.
    AuthRequired,
    /// The attempt failed locally or on the transport.
    Failed,
}

impl HandshakeState {
    /// Terminal states are final; a new attempt needs a new state machine.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Established | Self::Rejected | Self::AuthRequired | Self::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Every non-terminal state may fail; otherwise only the forward step
    /// is allowed, and the setup response decides between the outcomes.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        use HandshakeState::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Failed) => true,
            (Resolving, Authenticating)
            | (Authenticating, Connecting)
            | (Connecting, SendingPrefix)
            | (SendingPrefix, AwaitingSetupResponse)
            | (AwaitingSetupResponse, Established | Rejected | AuthRequired) => true,
            _ => false,
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolving => write!(f, "Resolving"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Connecting => write!(f, "Connecting"),
            Self::SendingPrefix => write!(f, "SendingPrefix"),
            Self::AwaitingSetupResponse => write!(f, "AwaitingSetupResponse"),
            Self::Established => write!(f, "Established"),
            Self::Rejected => write!(f, "Rejected"),
            Self::AuthRequired => write!(f, "AuthRequired"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Send the client prefix in a single write, using the stream's byte order.
///
/// Returns the number of bytes written.
pub async fn send_client_prefix<W: AsyncWrite + Unpin>(
    outstream: &mut X11OutStream<W>,
    prefix: &ClientPrefix,
) -> Result<usize, ProtocolError> {
    prefix.write_to(outstream)?;
    let expected = outstream.buffered();
    let written = outstream.send_once().await?;
    if written < expected {
        return Err(ProtocolError::ShortWrite { written, expected });
    }
    Ok(written)
}

/// Receive the server's setup response.
pub async fn read_setup_response<R: AsyncRead + Unpin>(
    instream: &mut X11InStream<R>,
) -> Result<SetupResponse, ProtocolError> {
    SetupResponse::read_from(instream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ByteOrder, SetupStatus};
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn create_duplex_pair(
        order: ByteOrder,
    ) -> (
        (X11InStream<tokio::io::DuplexStream>, X11OutStream<tokio::io::DuplexStream>),
        (X11InStream<tokio::io::DuplexStream>, X11OutStream<tokio::io::DuplexStream>),
    ) {
        let (client_read, server_write) = tokio::io::duplex(1024);
        let (server_read, client_write) = tokio::io::duplex(1024);
        (
            (
                X11InStream::with_order(client_read, order),
                X11OutStream::with_order(client_write, order),
            ),
            (
                X11InStream::with_order(server_read, order),
                X11OutStream::with_order(server_write, order),
            ),
        )
    }

    /// Accepts at most `limit` bytes per write.
    struct ShortWriter {
        limit: usize,
    }

    impl AsyncWrite for ShortWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len().min(self.limit)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_forward_transitions() {
        use HandshakeState::*;
        let path = [
            Resolving,
            Authenticating,
            Connecting,
            SendingPrefix,
            AwaitingSetupResponse,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        for outcome in [Established, Rejected, AuthRequired, Failed] {
            assert!(AwaitingSetupResponse.can_advance_to(outcome));
        }
    }

    #[test]
    fn test_illegal_transitions() {
        use HandshakeState::*;
        assert!(!Resolving.can_advance_to(Connecting));
        assert!(!SendingPrefix.can_advance_to(Established));
        assert!(!Connecting.can_advance_to(Rejected));
        assert!(!AwaitingSetupResponse.can_advance_to(Resolving));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use HandshakeState::*;
        for terminal in [Established, Rejected, AuthRequired, Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_advance_to(Failed));
            assert!(!terminal.can_advance_to(Resolving));
        }
        assert!(Connecting.can_advance_to(Failed));
        assert!(!Connecting.is_terminal());
    }

    #[tokio::test]
    async fn test_prefix_exchange() {
        let ((mut client_in, mut client_out), (mut server_in, mut server_out)) =
            create_duplex_pair(ByteOrder::LsbFirst);

        let prefix = ClientPrefix::new(b"MIT-MAGIC-COOKIE-1".to_vec(), vec![9u8; 16]);
        let written = send_client_prefix(&mut client_out, &prefix).await.unwrap();
        assert_eq!(written, prefix.encoded_len());

        let (order, received) = ClientPrefix::read_from(&mut server_in).await.unwrap();
        assert_eq!(order, ByteOrder::LsbFirst);
        assert_eq!(received, prefix);

        SetupResponse::failed("go away", 11, 0).write_to(&mut server_out);
        server_out.flush().await.unwrap();

        let response = read_setup_response(&mut client_in).await.unwrap();
        assert_eq!(response.status(), SetupStatus::Failed);
        assert_eq!(response.reason().as_deref(), Some("go away"));
    }

    #[tokio::test]
    async fn test_short_write_is_not_retried() {
        let mut out = X11OutStream::new(ShortWriter { limit: 5 });
        let prefix = ClientPrefix::new(b"abc".to_vec(), b"12345".to_vec());
        let err = send_client_prefix(&mut out, &prefix).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortWrite {
                written: 5,
                expected: 24
            }
        ));
        assert_eq!(out.buffered(), 0);
    }
}
