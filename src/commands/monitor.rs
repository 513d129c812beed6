//! Monitor command implementation

use bootlink_serial::trace::hex_dump;
use bootlink_serial::TransportError;

use super::open_transport;
use crate::cli::PortArgs;

/// Print raw input until `count` reads have been made (0 = until closed)
pub async fn run_monitor(
    port: &PortArgs,
    timeout_ms: u64,
    count: usize,
    tracing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut transport = open_transport(port, false, tracing).await?;
    println!("Monitoring {} at {} baud", port.port, transport.baud_rate());

    let mut reads = 0;
    let result = loop {
        if count != 0 && reads >= count {
            break Ok(());
        }
        reads += 1;

        match transport.raw_read(timeout_ms).await {
            Ok(bytes) => println!("{}", hex_dump(&bytes)),
            Err(TransportError::Timeout { .. }) => log::debug!("no data within {} ms", timeout_ms),
            Err(TransportError::Closed) => {
                println!("Port closed");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    transport.disconnect().await?;
    Ok(result?)
}
