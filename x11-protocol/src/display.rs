//! Display identifier parsing.
//!
//! A display identifier has the form `[host][/protocol]:display[.screen]`,
//! for example `:0`, `myhost/tcp:1.2` or `/unix:0`. When the identifier
//! given by the caller is empty or has no `:`, the `DISPLAY` environment
//! variable is used instead.
//!
//! # Examples
//!
//! ```
//! use x11_protocol::display::{DisplayAddress, TransportKind};
//!
//! let address = DisplayAddress::resolve_with("remote/tcp:1.2", None, "here").unwrap();
//! assert_eq!(address.host(), "remote");
//! assert_eq!(address.transport(), TransportKind::Network);
//! assert_eq!(address.display(), 1);
//! assert_eq!(address.screen(), 2);
//! ```

use crate::auth::{FAMILY_INTERNET, FAMILY_INTERNET6, FAMILY_LOCAL, FAMILY_WILD};
use crate::error::ProtocolError;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// Environment variable consulted when no usable identifier is supplied.
pub const DISPLAY_ENV: &str = "DISPLAY";

/// Default prefix of the local display sockets.
pub const DEFAULT_UNIX_SOCKET_BASE: &str = "/tmp/.X11-unix/X";

/// Base TCP port; display `N` listens on `6000 + N`.
pub const DEFAULT_TCP_BASE_PORT: u16 = 6000;

const UNIX_PROTOCOL: &str = "unix";

/// How the display is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Local Unix-domain socket.
    Unix,
    /// Network socket; the protocol token names the family.
    Network,
}

/// A parsed display identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAddress {
    host: String,
    protocol: String,
    transport: TransportKind,
    display: u32,
    screen: u32,
}

impl DisplayAddress {
    /// Resolve `identifier`, falling back to `$DISPLAY` and taking the local
    /// hostname from the operating system.
    pub fn resolve(identifier: &str) -> Result<Self, ProtocolError> {
        let fallback = std::env::var(DISPLAY_ENV).ok();
        Self::resolve_with(identifier, fallback.as_deref(), &local_hostname())
    }

    /// Resolve `identifier` without touching the process environment.
    ///
    /// `fallback` stands in for `$DISPLAY` and `local_host` is used whenever
    /// the identifier names no host.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidDisplayName`] when neither the identifier nor
    /// the fallback contains a `:`.
    pub fn resolve_with(
        identifier: &str,
        fallback: Option<&str>,
        local_host: &str,
    ) -> Result<Self, ProtocolError> {
        let name = if identifier.contains(':') {
            identifier
        } else {
            match fallback {
                Some(value) if value.contains(':') => value,
                _ => return Err(ProtocolError::InvalidDisplayName(identifier.to_string())),
            }
        };

        let colon = name
            .rfind(':')
            .ok_or_else(|| ProtocolError::InvalidDisplayName(name.to_string()))?;
        let (head, tail) = (&name[..colon], &name[colon + 1..]);

        let (host, protocol) = match head.rfind('/') {
            Some(slash) => (&head[..slash], &head[slash + 1..]),
            None => ("", UNIX_PROTOCOL),
        };
        let host = if host.is_empty() { local_host } else { host };

        let (display, screen) = match tail.rfind('.') {
            Some(dot) => (&tail[..dot], &tail[dot + 1..]),
            None => (tail, ""),
        };

        let transport = match protocol {
            "unix" | "local" => TransportKind::Unix,
            _ => TransportKind::Network,
        };

        Ok(Self {
            host: host.to_string(),
            protocol: protocol.to_string(),
            transport,
            display: lenient_number(display),
            screen: lenient_number(screen),
        })
    }

    /// Host name or address; empty for the local machine.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The raw protocol token, e.g. `unix`, `tcp` or `inet6`.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Which kind of socket reaches the display.
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Display number.
    #[must_use]
    pub fn display(&self) -> u32 {
        self.display
    }

    /// Screen number, 0 when omitted.
    #[must_use]
    pub fn screen(&self) -> u32 {
        self.screen
    }

    /// Path of the local socket: `<base><display>`, with `.<screen>` appended
    /// for a non-zero screen.
    #[must_use]
    pub fn unix_socket_path(&self, base: &str) -> PathBuf {
        if self.screen != 0 {
            PathBuf::from(format!("{}{}.{}", base, self.display, self.screen))
        } else {
            PathBuf::from(format!("{}{}", base, self.display))
        }
    }

    /// TCP port for this display, or `None` if it does not fit in 16 bits.
    #[must_use]
    pub fn tcp_port(&self, base_port: u16) -> Option<u16> {
        u16::try_from(self.display)
            .ok()
            .and_then(|n| base_port.checked_add(n))
    }

    /// Authority family and address an authority record must carry to
    /// apply to this display.
    ///
    /// `localhost` names the local machine over either transport and is
    /// keyed by the machine's host name.
    #[must_use]
    pub fn auth_family_address(&self) -> (u16, Vec<u8>) {
        if self.transport == TransportKind::Unix {
            if self.host.is_empty() || self.host == "localhost" {
                return (FAMILY_LOCAL, local_hostname().into_bytes());
            }
            return (FAMILY_LOCAL, self.host.as_bytes().to_vec());
        }
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => (FAMILY_INTERNET, ip.octets().to_vec()),
            Ok(IpAddr::V6(ip)) => (FAMILY_INTERNET6, ip.octets().to_vec()),
            Err(_) if self.host == "localhost" => {
                (FAMILY_LOCAL, local_hostname().into_bytes())
            }
            Err(_) if self.host == local_hostname() => {
                (FAMILY_LOCAL, self.host.as_bytes().to_vec())
            }
            Err(_) => (FAMILY_WILD, self.host.as_bytes().to_vec()),
        }
    }

    /// The display number as stored in authority records.
    #[must_use]
    pub fn auth_display_number(&self) -> Vec<u8> {
        self.display.to_string().into_bytes()
    }
}

impl fmt::Display for DisplayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}.{}",
            self.host, self.protocol, self.display, self.screen
        )
    }
}

/// Empty or non-numeric components count as 0.
fn lenient_number(text: &str) -> u32 {
    text.parse().unwrap_or(0)
}

/// The machine's hostname, or `localhost` if it cannot be determined.
pub fn local_hostname() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            if let Some(name) = name.to_str() {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }
    "localhost".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(identifier: &str) -> DisplayAddress {
        DisplayAddress::resolve_with(identifier, None, "myhost").unwrap()
    }

    #[test]
    fn test_full_identifier() {
        let address = parse("remote/tcp:1.2");
        assert_eq!(address.host(), "remote");
        assert_eq!(address.protocol(), "tcp");
        assert_eq!(address.transport(), TransportKind::Network);
        assert_eq!(address.display(), 1);
        assert_eq!(address.screen(), 2);
    }

    #[test]
    fn test_screen_defaults_to_zero() {
        let address = parse("remote/tcp:1");
        assert_eq!(address.host(), "remote");
        assert_eq!(address.transport(), TransportKind::Network);
        assert_eq!(address.display(), 1);
        assert_eq!(address.screen(), 0);
    }

    #[test]
    fn test_bare_colon() {
        let address = parse(":");
        assert_eq!(address.host(), "myhost");
        assert_eq!(address.transport(), TransportKind::Unix);
        assert_eq!(address.display(), 0);
        assert_eq!(address.screen(), 0);
    }

    #[test]
    fn test_no_slash_means_local_unix() {
        let address = parse(":3.1");
        assert_eq!(address.host(), "myhost");
        assert_eq!(address.protocol(), "unix");
        assert_eq!(address.display(), 3);
        assert_eq!(address.screen(), 1);
    }

    #[test]
    fn test_empty_host_segment() {
        let address = parse("/unix:0");
        assert_eq!(address.host(), "myhost");
        assert_eq!(address.transport(), TransportKind::Unix);

        let address = parse("/local:0");
        assert_eq!(address.transport(), TransportKind::Unix);
    }

    #[test]
    fn test_non_numeric_components_are_zero() {
        let address = parse("remote/tcp:abc.xyz");
        assert_eq!(address.display(), 0);
        assert_eq!(address.screen(), 0);
    }

    #[test]
    fn test_last_separators_win() {
        let address = parse("a/b/inet6:7.8");
        assert_eq!(address.host(), "a/b");
        assert_eq!(address.protocol(), "inet6");
        assert_eq!(address.display(), 7);
        assert_eq!(address.screen(), 8);
    }

    #[test]
    fn test_fallback_used_without_colon() {
        let address = DisplayAddress::resolve_with("", Some("other/tcp:5"), "myhost").unwrap();
        assert_eq!(address.host(), "other");
        assert_eq!(address.display(), 5);

        let address = DisplayAddress::resolve_with("junk", Some(":2"), "myhost").unwrap();
        assert_eq!(address.display(), 2);
    }

    #[test]
    fn test_unusable_fallback_is_invalid() {
        for fallback in [None, Some(""), Some("nocolon")] {
            let err = DisplayAddress::resolve_with("", fallback, "myhost").unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidDisplayName(_)));
        }
    }

    #[test]
    fn test_display_format() {
        assert_eq!(parse("remote/tcp:1.2").to_string(), "remote/tcp:1.2");
        assert_eq!(parse(":0").to_string(), "myhost/unix:0.0");
    }

    #[test]
    fn test_unix_socket_path() {
        assert_eq!(
            parse(":0").unix_socket_path(DEFAULT_UNIX_SOCKET_BASE),
            PathBuf::from("/tmp/.X11-unix/X0")
        );
        assert_eq!(
            parse(":1.2").unix_socket_path("/run/X"),
            PathBuf::from("/run/X1.2")
        );
    }

    #[test]
    fn test_tcp_port() {
        assert_eq!(parse("h/tcp:10").tcp_port(DEFAULT_TCP_BASE_PORT), Some(6010));
        assert_eq!(parse("h/tcp:70000").tcp_port(DEFAULT_TCP_BASE_PORT), None);
        assert_eq!(parse("h/tcp:65000").tcp_port(DEFAULT_TCP_BASE_PORT), None);
    }

    #[test]
    fn test_auth_family_address() {
        assert_eq!(
            parse(":0").auth_family_address(),
            (FAMILY_LOCAL, b"myhost".to_vec())
        );
        assert_eq!(
            parse("10.0.0.7/tcp:0").auth_family_address(),
            (FAMILY_INTERNET, vec![10, 0, 0, 7])
        );
        let (family, address) = parse("::1/inet6:0").auth_family_address();
        assert_eq!(family, FAMILY_INTERNET6);
        assert_eq!(address.len(), 16);
    }

    #[test]
    fn test_localhost_unix_uses_machine_name() {
        let expected = (FAMILY_LOCAL, local_hostname().into_bytes());
        assert_eq!(parse("localhost/unix:0").auth_family_address(), expected);
        assert_eq!(parse("localhost:0").auth_family_address(), expected);
    }

    #[test]
    fn test_auth_display_number() {
        assert_eq!(parse(":12").auth_display_number(), b"12".to_vec());
    }
}
