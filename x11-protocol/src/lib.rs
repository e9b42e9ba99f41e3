//! X11 protocol connection-setup layer.
//!
//! This crate provides the protocol side of opening an X11 connection:
//! display-name parsing, authority file lookup, byte-order aware buffered
//! streams, the client prefix / setup response codec, and the socket types
//! the connection runs over. It performs no logging and spawns no tasks.
//!
//! # Modules
//!
//! - [`display`] - Display identifier resolution (`host/protocol:N.S`)
//! - [`auth`] - `.Xauthority` record scanning and best-match lookup
//! - [`io`] - Buffered I/O streams (X11InStream, X11OutStream)
//! - [`messages`] - Client prefix and setup response wire formats
//! - [`handshake`] - Handshake states and the prefix/response exchange
//! - [`socket`] - Socket abstractions (TCP, Unix domain)
//!
//! # Examples
//!
//! ```no_run
//! use x11_protocol::{DisplayAddress, UnixSocket};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let address = DisplayAddress::resolve(":0")?;
//! let socket = UnixSocket::connect(address.unix_socket_path("/tmp/.X11-unix/X")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod display;
pub mod error;
pub mod handshake;
pub mod io;
pub mod messages;
pub mod socket;

// Re-export commonly used types
pub use auth::{AuthRecord, AuthorityFile, MIT_MAGIC_COOKIE};
pub use display::{DisplayAddress, TransportKind};
pub use error::ProtocolError;
pub use handshake::HandshakeState;
pub use io::{X11InStream, X11OutStream};
pub use messages::{ByteOrder, ClientPrefix, SetupResponse, SetupStatus, SetupSummary};
pub use socket::{TcpSocket, X11Socket};

#[cfg(unix)]
pub use socket::UnixSocket;
