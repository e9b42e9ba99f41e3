//! X11 connection-setup message types.
//!
//! Two messages make up connection setup:
//!
//! - **Client prefix** ([`client`]) - byte-order marker, protocol version and
//!   authorization credentials, sent once by the client
//! - **Setup response** ([`server`]) - the server's verdict plus the setup
//!   block or a reason string
//!
//! Shared constants and the [`ByteOrder`] type live in [`types`].
//!
//! # Wire Format Rules
//!
//! 1. **Negotiated byte order** - every multi-byte integer uses the order the
//!    client announces; nothing is implied by the host or by global state
//! 2. **4-byte alignment** - variable-length fields are followed by zero
//!    padding up to the next multiple of 4
//! 3. **Fail-fast errors** - unknown status bytes and truncated replies are
//!    errors, never guessed at
//!
//! # Examples
//!
//! ```
//! use x11_protocol::messages::{ByteOrder, ClientPrefix};
//!
//! let prefix = ClientPrefix::new(b"MIT-MAGIC-COOKIE-1".to_vec(), vec![0u8; 16]);
//! let bytes = prefix.pack(ByteOrder::LsbFirst).unwrap();
//! assert_eq!(bytes[0], b'l');
//! assert_eq!(bytes.len(), 12 + 20 + 16);
//! ```

pub mod client;
pub mod server;
pub mod types;

mod proptest_framing;

pub use types::{
    pad, padded_len, ByteOrder, SetupStatus, LSB_FIRST_MARKER, MSB_FIRST_MARKER,
    PROTOCOL_MAJOR_VERSION, PROTOCOL_MINOR_VERSION,
};

pub use client::{ClientPrefix, CLIENT_PREFIX_HEADER_LEN};

pub use server::{SetupResponse, SetupResponseHeader, SetupSummary, SETUP_RESPONSE_HEADER_LEN};
