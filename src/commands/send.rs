//! Send command implementation

use bootlink_serial::trace::hex_dump;
use bootlink_serial::TransportError;

use super::open_transport;
use crate::cli::{parse_hex_bytes, PortArgs};

/// Options for the send command
pub struct SendOptions {
    pub raw: bool,
    pub timeout_ms: u64,
    pub min_length: usize,
}

/// Write one payload and print the reply
pub async fn run_send(
    port: &PortArgs,
    payload_hex: &[String],
    opts: SendOptions,
    tracing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = parse_hex_bytes(&payload_hex.join(""))?;

    let mut transport = open_transport(port, !opts.raw, tracing).await?;
    transport.write(&payload).await?;
    log::info!("Sent {} bytes", payload.len());

    let reply = transport.read(opts.timeout_ms, opts.min_length).await;
    transport.disconnect().await?;

    match reply {
        Ok(bytes) if bytes.is_empty() => {
            println!("Incomplete response (no full frame received)");
            Ok(())
        }
        Ok(bytes) => {
            println!("Received {} bytes: {}", bytes.len(), hex_dump(&bytes));
            Ok(())
        }
        Err(e @ TransportError::Timeout { .. }) => {
            eprintln!("No response from device");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
