//! Async X11 client connection library.
//!
//! This crate opens connections to X servers on top of the low-level
//! `x11-protocol` crate. It resolves the display identifier, looks up
//! credentials in the authority file, dials the Unix or TCP transport, runs
//! the connection-setup exchange and then hands the stream to a pump that
//! moves raw protocol bytes between the socket and the application.
//!
//! # Features
//!
//! - **Async I/O**: Built on tokio; every blocking step is bounded by a
//!   timeout and a cancellation token
//! - **Credential lookup**: Best-ranked `.Xauthority` match per configured
//!   protocol preference
//! - **Observable handshake**: Every state transition is recorded
//! - **Configuration management**: TOML files and an optional CLI
//!
//! # Quick Start
//!
//! ```no_run
//! use x11_client::{ClientBuilder, Config, Message};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::builder().display(":0").build()?;
//!     let connection = ClientBuilder::new(config).build().await?;
//!
//!     if let Some(summary) = connection.summary() {
//!         println!("Vendor: {}", summary.vendor);
//!     }
//!
//!     // GetInputFocus in the default most-significant-first order.
//!     connection.send(Message::new(vec![43u8, 0, 0, 1])).await?;
//!     if let Some(reply) = connection.recv().await {
//!         println!("Got {} bytes", reply.len());
//!     }
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Once the server accepts the connection three tasks share the transport:
//!
//! - **Transmit**: writes queued outbound messages in submission order
//! - **Receive**: turns each read into one inbound message
//! - **Report**: logs pump errors and forwards them without blocking
//!
//! Communication between the tasks and the application uses bounded
//! channels. Closing the connection cancels one token watched by all three.
//!
//! # Error Handling
//!
//! Errors from the handshake are returned from [`ClientBuilder::build`] and
//! end the attempt. Errors on an established connection arrive on
//! [`Connection::errors`]; a failed write or read also stops the task that
//! hit it.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod errors;
pub mod handshake;
pub mod messages;
pub mod protocol_trace;
pub mod transport;

// Private implementation modules
mod connection;
mod pump;

// Optional CLI support
#[cfg(feature = "cli")]
pub mod args;

// Re-exports
pub use config::Config;
pub use connection::{Connection, ConnectionHandle};
pub use errors::XClientError;
pub use handshake::Handshake;
pub use messages::Message;

use tokio_util::sync::CancellationToken;

/// Builder for opening an X11 connection.
///
/// # Examples
///
/// ```no_run
/// use x11_client::{ClientBuilder, Config};
/// use tokio_util::sync::CancellationToken;
/// # use anyhow::Result;
///
/// # async fn example() -> Result<()> {
/// let cancel = CancellationToken::new();
/// let config = Config::builder().display("unix:1").build()?;
///
/// let connection = ClientBuilder::new(config)
///     .cancel_token(cancel.clone())
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: Config,
    cancel: CancellationToken,
}

impl ClientBuilder {
    /// Creates a new client builder with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to abort the handshake and, later, close the connection.
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the handshake and starts the connection pump.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The display identifier cannot be resolved
    /// - The authority file is malformed
    /// - The transport cannot be dialed
    /// - The server rejects the connection or asks for more authentication
    pub async fn build(self) -> Result<Connection, XClientError> {
        self.config.validate()?;
        let mut handshake = Handshake::new(self.config);
        handshake.run(&self.cancel).await
    }
}

/// Connect to `display` with default settings.
///
/// An empty `display` defers to `$DISPLAY`.
///
/// # Errors
///
/// See [`ClientBuilder::build`].
pub async fn connect(display: &str) -> Result<Connection, XClientError> {
    let config = Config::builder().display(display).build()?;
    ClientBuilder::new(config).build().await
}
