//! Connect to an X display and print what the server reports.
//!
//! Usage:
//!   cargo run --example display_info --features cli -- :0
//!
//! This example demonstrates:
//! - Building a configuration from command-line arguments
//! - Running the connection-setup handshake
//! - Sending one request and waiting for the reply
//! - Graceful shutdown

use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};
use x11_client::args::Args;
use x11_client::{ClientBuilder, Config, Message};
use x11_protocol::ByteOrder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::from_args(args)?;
    info!("Connecting to display {:?}", config.display());

    let connection = match ClientBuilder::new(config).build().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to connect: {}", e);
            return Err(e.into());
        }
    };

    println!("Display:  {}", connection.address());
    let header = &connection.setup().header;
    println!("Protocol: {}.{}", header.major_version, header.minor_version);
    match connection.summary() {
        Some(summary) => {
            println!("Vendor:   {}", summary.vendor);
            println!("Release:  {}", summary.release_number);
            println!("Screens:  {}", summary.roots);
            println!("Keycodes: {}..={}", summary.min_keycode, summary.max_keycode);
            println!("Max request length: {} words", summary.maximum_request_length);
        }
        None => println!("Setup block too short to summarize"),
    }

    // GetInputFocus: opcode 43, request length 1.
    let request = match connection.byte_order() {
        ByteOrder::MsbFirst => vec![43u8, 0, 0, 1],
        ByteOrder::LsbFirst => vec![43u8, 0, 1, 0],
    };
    connection.send(Message::new(request)).await?;
    match timeout(Duration::from_secs(5), connection.recv()).await {
        Ok(Some(reply)) => info!("GetInputFocus reply: {} bytes", reply.len()),
        Ok(None) => error!("Server closed the connection"),
        Err(_) => error!("No reply within 5s"),
    }

    connection.close().await?;
    Ok(())
}
