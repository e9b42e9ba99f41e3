//! Integration tests against a live X server.
//!
//! These tests require a running X server. Set `X11_TEST_DISPLAY` to the
//! display to use (default: `$DISPLAY`).
//!
//! Example:
//!   X11_TEST_DISPLAY=:1 cargo test --test integration -- --ignored --nocapture

use std::env;
use std::time::Duration;
use tokio::time::timeout;
use x11_client::{ClientBuilder, Config, Message};
use x11_protocol::ByteOrder;

fn test_display() -> String {
    env::var("X11_TEST_DISPLAY").unwrap_or_default()
}

/// Connect and inspect the setup block.
#[tokio::test]
#[ignore] // Requires running X server
async fn test_basic_connection() -> anyhow::Result<()> {
    let config = Config::builder().display(test_display()).build()?;
    let connection = ClientBuilder::new(config).build().await?;

    let summary = connection
        .summary()
        .ok_or_else(|| anyhow::anyhow!("setup block too short"))?;
    println!(
        "Connected to {} ({}, release {})",
        connection.address(),
        summary.vendor,
        summary.release_number
    );
    assert!(summary.roots > 0);
    assert!(summary.min_keycode >= 8);

    connection.close().await?;
    Ok(())
}

/// GetInputFocus always gets a 32-byte reply.
#[tokio::test]
#[ignore] // Requires running X server
async fn test_round_trip() -> anyhow::Result<()> {
    let config = Config::builder().display(test_display()).build()?;
    let connection = ClientBuilder::new(config).build().await?;

    let request = match connection.byte_order() {
        ByteOrder::MsbFirst => vec![43u8, 0, 0, 1],
        ByteOrder::LsbFirst => vec![43u8, 0, 1, 0],
    };
    connection.send(Message::new(request)).await?;

    let mut received = 0;
    while received < 32 {
        match timeout(Duration::from_secs(5), connection.recv()).await? {
            Some(msg) => received += msg.len(),
            None => anyhow::bail!("server closed the connection"),
        }
    }
    assert_eq!(received, 32);

    connection.close().await?;
    Ok(())
}
