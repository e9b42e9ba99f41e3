//! Connection-setup driver.
//!
//! [`Handshake`] walks one attempt through resolving the display, looking up
//! credentials, dialing, sending the client prefix and reading the setup
//! response. Every transition is checked against
//! [`HandshakeState::can_advance_to`] and recorded. A handshake runs once;
//! whatever terminal state it reaches is final.

use crate::config::Config;
use crate::connection::{Connection, Established};
use crate::errors::XClientError;
use crate::protocol_trace;
use crate::transport::{guarded, Transport};
use bytes::Bytes;
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use x11_protocol::handshake::{read_setup_response, send_client_prefix};
use x11_protocol::{
    AuthorityFile, ClientPrefix, DisplayAddress, HandshakeState, ProtocolError, SetupStatus,
    X11InStream, X11OutStream,
};

/// One connection attempt.
pub struct Handshake {
    config: Config,
    state: HandshakeState,
    history: Vec<HandshakeState>,
}

impl Handshake {
    /// A fresh attempt in the `Resolving` state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: HandshakeState::Resolving,
            history: vec![HandshakeState::Resolving],
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Every state entered so far, starting with `Resolving`.
    #[must_use]
    pub fn history(&self) -> &[HandshakeState] {
        &self.history
    }

    /// Run the attempt over the transport named by the configured display.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Connection, XClientError> {
        let connection = self.config.connection.clone();
        self.run_with(cancel, move |address| async move {
            Transport::dial(&address, &connection).await
        })
        .await
    }

    /// Run the attempt, obtaining the byte stream from `dial`.
    ///
    /// The dial, the prefix write and the response read are each bounded by
    /// the configured timeout and by `cancel`. Cancelling `cancel` after the
    /// connection is established also closes it.
    pub async fn run_with<S, F, Fut>(
        &mut self,
        cancel: &CancellationToken,
        dial: F,
    ) -> Result<Connection, XClientError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        F: FnOnce(DisplayAddress) -> Fut,
        Fut: Future<Output = Result<S, XClientError>>,
    {
        if self.state != HandshakeState::Resolving {
            return Err(XClientError::Internal(format!(
                "handshake already ran and ended in {}",
                self.state
            )));
        }

        match self.drive(cancel, dial).await {
            Ok(connection) => Ok(connection),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn drive<S, F, Fut>(
        &mut self,
        cancel: &CancellationToken,
        dial: F,
    ) -> Result<Connection, XClientError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
        F: FnOnce(DisplayAddress) -> Fut,
        Fut: Future<Output = Result<S, XClientError>>,
    {
        let address = DisplayAddress::resolve(self.config.display())?;
        tracing::debug!("Resolved display {}", address);

        self.advance(HandshakeState::Authenticating)?;
        let (auth_name, auth_data) = self.lookup_credentials(&address).await?;

        self.advance(HandshakeState::Connecting)?;
        let timeout = self.config.timeout();
        let stream = guarded(cancel, timeout, dial(address.clone())).await?;

        let order = self.config.byte_order();
        let (reader, writer) = tokio::io::split(stream);
        let mut input =
            X11InStream::with_capacity(reader, order, self.config.pump.read_buffer_size);
        let mut output = X11OutStream::with_order(writer, order);

        self.advance(HandshakeState::SendingPrefix)?;
        let prefix = ClientPrefix::new(auth_name, auth_data);
        protocol_trace::out_msg(
            "ClientPrefix",
            &format!(
                "order={} version={}.{} auth={:?} data_len={}",
                order,
                prefix.major_version,
                prefix.minor_version,
                String::from_utf8_lossy(&prefix.auth_name),
                prefix.auth_data.len()
            ),
        );
        let written = guarded(cancel, timeout, async {
            send_client_prefix(&mut output, &prefix)
                .await
                .map_err(XClientError::from)
        })
        .await?;
        tracing::trace!("Client prefix sent ({} bytes)", written);

        self.advance(HandshakeState::AwaitingSetupResponse)?;
        let setup = guarded(cancel, timeout, async {
            read_setup_response(&mut input)
                .await
                .map_err(XClientError::from)
        })
        .await?;
        protocol_trace::in_msg(
            "SetupResponse",
            &format!(
                "status={} version={}.{} additional={}",
                setup.status(),
                setup.header.major_version,
                setup.header.minor_version,
                setup.additional.len()
            ),
        );

        match setup.status() {
            SetupStatus::Success => {
                self.advance(HandshakeState::Established)?;
                match setup.summary(order) {
                    Some(summary) => tracing::info!(
                        "Connected to {} (vendor {:?}, release {}, {} screen(s))",
                        address,
                        summary.vendor,
                        summary.release_number,
                        summary.roots
                    ),
                    None => tracing::info!("Connected to {}", address),
                }

                let (reader, leftover) = input.into_parts();
                let writer = output.into_inner();
                let parts = Established {
                    reader,
                    leftover: Bytes::from(leftover),
                    writer,
                    setup,
                    address,
                    order,
                };
                Ok(Connection::start(parts, &self.config.pump, cancel.child_token()))
            }
            SetupStatus::Failed => Err(XClientError::Rejected(
                setup.reason().unwrap_or_default(),
            )),
            SetupStatus::AuthenticateMore => Err(XClientError::AuthRequired(
                setup.reason().unwrap_or_default(),
            )),
        }
    }

    /// Best-ranked credentials for `address`, or empty ones when the
    /// authority file is absent or has no match.
    async fn lookup_credentials(
        &self,
        address: &DisplayAddress,
    ) -> Result<(Vec<u8>, Vec<u8>), XClientError> {
        let file = match &self.config.auth.authority_file {
            Some(path) => AuthorityFile::open(path.clone()),
            None => match AuthorityFile::locate() {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("{}; connecting without credentials", e);
                    return Ok((Vec::new(), Vec::new()));
                }
            },
        };

        let (family, host) = address.auth_family_address();
        let number = address.auth_display_number();
        match file
            .find_best(family, &host, &number, &self.config.auth.protocols)
            .await
        {
            Ok(record) => {
                tracing::debug!("Using authority record {:?}", record);
                Ok((record.name, record.data))
            }
            Err(ProtocolError::NotFound) => {
                tracing::debug!("No authority record for {}", address);
                Ok((Vec::new(), Vec::new()))
            }
            Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Authority file {} does not exist; connecting without credentials",
                    file.path().display()
                );
                Ok((Vec::new(), Vec::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn advance(&mut self, next: HandshakeState) -> Result<(), XClientError> {
        if !self.state.can_advance_to(next) {
            return Err(XClientError::Internal(format!(
                "invalid handshake transition {} -> {}",
                self.state, next
            )));
        }
        tracing::debug!("Handshake {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self, err: &XClientError) {
        let terminal = err.terminal_state();
        let next = if self.state.can_advance_to(terminal) {
            terminal
        } else {
            HandshakeState::Failed
        };
        if self.state.can_advance_to(next) {
            self.state = next;
            self.history.push(next);
        }
        tracing::warn!("Handshake ended in {}: {}", self.state, err);
    }
}
