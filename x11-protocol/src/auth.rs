//! Authority file (`.Xauthority`) scanning.
//!
//! The file is a plain sequence of records. Each record is a 2-byte
//! big-endian family code followed by four length-prefixed byte strings:
//! address, display number, protocol name and secret data. Every length is
//! itself 2 bytes big-endian.
//!
//! Records are streamed one at a time; nothing is collected except the
//! current best candidate during [`find_best`].

use crate::error::ProtocolError;
use crate::io::{X11InStream, X11OutStream};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};

/// IPv4 address, 4 bytes.
pub const FAMILY_INTERNET: u16 = 0;
/// DECnet node.
pub const FAMILY_DECNET: u16 = 1;
/// Chaosnet address.
pub const FAMILY_CHAOS: u16 = 2;
/// Server-interpreted address.
pub const FAMILY_SERVER_INTERPRETED: u16 = 5;
/// IPv6 address, 16 bytes.
pub const FAMILY_INTERNET6: u16 = 6;
/// Loopback connection.
pub const FAMILY_LOCALHOST: u16 = 252;
/// Kerberos 5 principal.
pub const FAMILY_KRB5_PRINCIPAL: u16 = 253;
/// Secure RPC netname.
pub const FAMILY_NETNAME: u16 = 254;
/// Local connection keyed by host name.
pub const FAMILY_LOCAL: u16 = 256;
/// Matches any address.
pub const FAMILY_WILD: u16 = 65535;

/// Name of the cookie-based authorization protocol.
pub const MIT_MAGIC_COOKIE: &str = "MIT-MAGIC-COOKIE-1";

/// Variable naming the authority file explicitly.
pub const XAUTHORITY_ENV: &str = "XAUTHORITY";
/// Home directory holding `.Xauthority` by default.
pub const HOME_ENV: &str = "HOME";
const DEFAULT_AUTHORITY_FILE: &str = ".Xauthority";

/// One entry of the authority file.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AuthRecord {
    /// Address family, one of the `FAMILY_*` codes.
    pub family: u16,
    /// Host address in the family's encoding.
    pub address: Vec<u8>,
    /// Display number as decimal text; empty matches any display.
    pub number: Vec<u8>,
    /// Authorization protocol name.
    pub name: Vec<u8>,
    /// Secret data for the protocol.
    pub data: Vec<u8>,
}

impl AuthRecord {
    /// Whether this record applies to the given family, address and display
    /// number.
    ///
    /// Either side being [`FAMILY_WILD`] matches any address; otherwise both
    /// family and address must be equal. An empty record number matches any
    /// display.
    #[must_use]
    pub fn matches(&self, family: u16, address: &[u8], number: &[u8]) -> bool {
        let family_ok = family == FAMILY_WILD
            || self.family == FAMILY_WILD
            || (self.family == family && self.address == address);
        let number_ok = self.number.is_empty() || self.number == number;
        family_ok && number_ok
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a record boundary.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedRecord`] if the stream ends inside a record.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut X11InStream<R>,
    ) -> Result<Option<Self>, ProtocolError> {
        if stream.at_eof().await? {
            return Ok(None);
        }

        let family = read_short(stream, "family").await?;
        let address = read_counted(stream, "address").await?;
        let number = read_counted(stream, "display number").await?;
        let name = read_counted(stream, "protocol name").await?;
        let data = read_counted(stream, "protocol data").await?;

        Ok(Some(Self {
            family,
            address,
            number,
            name,
            data,
        }))
    }

    /// Buffer the record on `stream` in authority-file format.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Violation`] if a field exceeds 65535 bytes.
    pub fn write_to<W: AsyncWrite + Unpin>(
        &self,
        stream: &mut X11OutStream<W>,
    ) -> Result<(), ProtocolError> {
        let fields = [&self.address, &self.number, &self.name, &self.data];
        for field in fields {
            if field.len() > u16::MAX as usize {
                return Err(ProtocolError::Violation(format!(
                    "authority field of {} bytes exceeds 65535",
                    field.len()
                )));
            }
        }

        // Authority files are big-endian whatever the wire order is.
        stream.write_bytes(&self.family.to_be_bytes());
        for field in fields {
            stream.write_bytes(&(field.len() as u16).to_be_bytes());
            stream.write_bytes(field);
        }
        Ok(())
    }
}

impl fmt::Debug for AuthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRecord")
            .field("family", &self.family)
            .field("address", &String::from_utf8_lossy(&self.address))
            .field("number", &String::from_utf8_lossy(&self.number))
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("data_len", &self.data.len())
            .finish()
    }
}

async fn read_short<R: AsyncRead + Unpin>(
    stream: &mut X11InStream<R>,
    field: &str,
) -> Result<u16, ProtocolError> {
    let mut raw = [0u8; 2];
    let got = stream.fill(&mut raw).await?;
    if got < raw.len() {
        return Err(ProtocolError::MalformedRecord(format!(
            "{} length truncated",
            field
        )));
    }
    Ok(u16::from_be_bytes(raw))
}

async fn read_counted<R: AsyncRead + Unpin>(
    stream: &mut X11InStream<R>,
    field: &str,
) -> Result<Vec<u8>, ProtocolError> {
    let len = read_short(stream, field).await? as usize;
    let mut value = vec![0u8; len];
    let got = stream.fill(&mut value).await?;
    if got < len {
        return Err(ProtocolError::MalformedRecord(format!(
            "{} truncated: {} of {} bytes",
            field, got, len
        )));
    }
    Ok(value)
}

/// First record that matches and carries protocol `name`.
///
/// # Errors
///
/// [`ProtocolError::NotFound`] if no record qualifies,
/// [`ProtocolError::MalformedRecord`] if a record is cut short.
pub async fn find_exact<R: AsyncRead + Unpin>(
    reader: R,
    family: u16,
    address: &[u8],
    number: &[u8],
    name: &[u8],
) -> Result<AuthRecord, ProtocolError> {
    let mut stream = X11InStream::new(reader);
    while let Some(record) = AuthRecord::read_from(&mut stream).await? {
        if record.matches(family, address, number) && record.name == name {
            return Ok(record);
        }
    }
    Err(ProtocolError::NotFound)
}

/// Best matching record according to `priorities`.
///
/// A record's rank is the position of its protocol name in `priorities`;
/// names not in the list never qualify. The whole file is scanned and the
/// lowest rank wins, the earlier record on a tie. With an empty list the
/// first matching record is returned.
///
/// # Errors
///
/// As for [`find_exact`].
pub async fn find_best<R, P>(
    reader: R,
    family: u16,
    address: &[u8],
    number: &[u8],
    priorities: &[P],
) -> Result<AuthRecord, ProtocolError>
where
    R: AsyncRead + Unpin,
    P: AsRef<[u8]>,
{
    let mut stream = X11InStream::new(reader);
    let mut best: Option<(usize, AuthRecord)> = None;

    while let Some(record) = AuthRecord::read_from(&mut stream).await? {
        if !record.matches(family, address, number) {
            continue;
        }
        if priorities.is_empty() {
            return Ok(record);
        }
        let Some(rank) = priorities
            .iter()
            .position(|p| p.as_ref() == record.name.as_slice())
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(current, _)| rank < *current) {
            best = Some((rank, record));
        }
    }

    best.map(|(_, record)| record).ok_or(ProtocolError::NotFound)
}

/// Location of the authority file: `$XAUTHORITY`, else `$HOME/.Xauthority`.
///
/// # Errors
///
/// [`ProtocolError::LocationUnresolvable`] if neither variable is set.
pub fn authority_path() -> Result<PathBuf, ProtocolError> {
    authority_path_from(
        std::env::var_os(XAUTHORITY_ENV),
        std::env::var_os(HOME_ENV),
    )
}

/// [`authority_path`] with the environment values passed in.
///
/// Empty values count as unset.
pub fn authority_path_from(
    xauthority: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, ProtocolError> {
    if let Some(path) = xauthority.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    if let Some(home) = home.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home).join(DEFAULT_AUTHORITY_FILE));
    }
    Err(ProtocolError::LocationUnresolvable)
}

/// An authority file on disk. Each lookup opens the file, scans it and
/// closes it again.
#[derive(Debug, Clone)]
pub struct AuthorityFile {
    path: PathBuf,
}

impl AuthorityFile {
    /// Refer to the file at `path`. Nothing is read until a lookup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The authority file named by the environment.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::LocationUnresolvable`] if neither variable is set.
    pub fn locate() -> Result<Self, ProtocolError> {
        authority_path().map(Self::open)
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// [`find_exact`] over the file's contents.
    ///
    /// # Errors
    ///
    /// Opening the file fails, or as for [`find_exact`].
    pub async fn find_exact(
        &self,
        family: u16,
        address: &[u8],
        number: &[u8],
        name: &[u8],
    ) -> Result<AuthRecord, ProtocolError> {
        let file = tokio::fs::File::open(&self.path).await?;
        find_exact(file, family, address, number, name).await
    }

    /// [`find_best`] over the file's contents.
    ///
    /// # Errors
    ///
    /// Opening the file fails, or as for [`find_best`].
    pub async fn find_best<P: AsRef<[u8]>>(
        &self,
        family: u16,
        address: &[u8],
        number: &[u8],
        priorities: &[P],
    ) -> Result<AuthRecord, ProtocolError> {
        let file = tokio::fs::File::open(&self.path).await?;
        find_best(file, family, address, number, priorities).await
    }
}
