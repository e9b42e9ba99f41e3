//! Fake X server helpers shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use x11_client::{Config, Connection, Handshake};
use x11_protocol::messages::{padded_len, SetupResponseHeader};
use x11_protocol::{ByteOrder, ClientPrefix, SetupResponse, SetupStatus, X11InStream, X11OutStream};

pub type ServerIn<S> = X11InStream<ReadHalf<S>>;
pub type ServerOut<S> = X11OutStream<WriteHalf<S>>;

/// A config that never finds credentials: the authority file does not exist.
pub fn test_config(display: &str) -> Config {
    Config::builder()
        .display(display)
        .authority_file(missing_authority_file())
        .timeout_ms(5_000)
        .build()
        .unwrap()
}

pub fn missing_authority_file() -> std::path::PathBuf {
    std::env::temp_dir()
        .join("x11-client-tests-missing")
        .join("Xauthority")
}

/// A big-endian setup block announcing one screen.
pub fn setup_block(vendor: &str) -> Vec<u8> {
    let mut block = vec![0u8; 32];
    block[0..4].copy_from_slice(&12_101_004u32.to_be_bytes());
    block[4..8].copy_from_slice(&0x0040_0000u32.to_be_bytes());
    block[8..12].copy_from_slice(&0x001F_FFFFu32.to_be_bytes());
    block[16..18].copy_from_slice(&(vendor.len() as u16).to_be_bytes());
    block[18..20].copy_from_slice(&u16::MAX.to_be_bytes());
    block[20] = 1;
    block[26] = 8;
    block[27] = 255;
    block.extend_from_slice(vendor.as_bytes());
    block.resize(padded_len(block.len()), 0);
    block
}

pub fn success_response(vendor: &str) -> SetupResponse {
    let block = setup_block(vendor);
    SetupResponse {
        header: SetupResponseHeader {
            status: SetupStatus::Success,
            reason_len: 0,
            major_version: 11,
            minor_version: 0,
            additional_words: (block.len() / 4) as u16,
        },
        additional: Bytes::from(block),
    }
}

/// Read the client prefix off a freshly accepted stream. The returned
/// output stream writes in the byte order the client announced.
pub async fn accept_prefix<S>(stream: S) -> (ByteOrder, ClientPrefix, ServerIn<S>, ServerOut<S>)
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut input = X11InStream::new(reader);
    let (order, prefix) = ClientPrefix::read_from(&mut input).await.unwrap();
    (order, prefix, input, X11OutStream::with_order(writer, order))
}

/// Run a handshake against an in-memory server that accepts it.
pub async fn established(
    config: Config,
) -> (
    Connection,
    ServerIn<DuplexStream>,
    ServerOut<DuplexStream>,
) {
    let (client, server) = tokio::io::duplex(4096);
    let server_task = tokio::spawn(async move {
        let (_, _, input, mut output) = accept_prefix(server).await;
        success_response("Fake Server").write_to(&mut output);
        output.flush().await.unwrap();
        (input, output)
    });

    let mut handshake = Handshake::new(config);
    let connection = handshake
        .run_with(&CancellationToken::new(), move |_| async move { Ok(client) })
        .await
        .unwrap();
    let (input, output) = server_task.await.unwrap();
    (connection, input, output)
}
