//! Command-line argument parsing for X11 client applications.
//!
//! This module is only available when the `cli` feature is enabled.
//!
//! # Examples
//!
//! ```no_run
//! use x11_client::args::Args;
//! use x11_client::Config;
//!
//! let args = Args::parse();
//! let config = Config::from_args(args)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{ByteOrderSetting, Config};
use crate::errors::XClientError;
use clap::Parser;
use std::path::PathBuf;

/// X11 client command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Display to connect to ([host][/protocol]:display[.screen])
    ///
    /// Examples:
    ///   - :0
    ///   - unix:1.0
    ///   - example.com/tcp:2
    ///
    /// Defaults to $DISPLAY.
    #[arg(value_name = "DISPLAY")]
    pub display: Option<String>,

    /// Authority file (overrides $XAUTHORITY and ~/.Xauthority)
    #[arg(short = 'a', long, value_name = "FILE")]
    pub auth_file: Option<PathBuf>,

    /// Authorization protocol, in priority order (repeatable)
    #[arg(long = "auth-protocol", value_name = "NAME")]
    pub auth_protocols: Vec<String>,

    /// Byte order announced to the server (msb, lsb or native)
    #[arg(long, value_name = "ORDER")]
    pub byte_order: Option<ByteOrderSetting>,

    /// Dial and setup timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Parse command-line arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse arguments from an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }
}

impl Config {
    /// Create a configuration from command-line arguments.
    ///
    /// A config file named in the arguments is loaded first; explicit
    /// arguments then override its values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The configuration validation fails
    pub fn from_args(args: Args) -> Result<Self, XClientError> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(display) = args.display {
            config.connection.display = Some(display);
        }
        if let Some(path) = args.auth_file {
            config.auth.authority_file = Some(path);
        }
        if !args.auth_protocols.is_empty() {
            config.auth.protocols = args.auth_protocols;
        }
        if let Some(order) = args.byte_order {
            config.wire.byte_order = order;
        }
        if let Some(timeout_ms) = args.timeout_ms {
            config.connection.timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}
