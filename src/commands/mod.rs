//! CLI command implementations
//!
//! Each command opens its own transport, does one job and closes the port
//! again, so the board is left with whatever line levels the command set.

mod list;
mod monitor;
mod reset;
mod send;
mod sequence;

pub use list::list_ports;
pub use monitor::run_monitor;
pub use reset::{run_reset, ResetOptions};
pub use send::{run_send, SendOptions};
pub use sequence::check_sequence;

use crate::cli::PortArgs;
use bootlink_serial::{SerialPortDevice, Transport, TransportConfig, TransportError};

/// Open `port` and connect at its baud rate
pub(crate) async fn open_transport(
    port: &PortArgs,
    slip: bool,
    tracing: bool,
) -> Result<Transport<SerialPortDevice>, TransportError> {
    let config = TransportConfig {
        slip,
        tracing,
        ..Default::default()
    };
    let mut transport = Transport::with_config(SerialPortDevice::new(&port.port), config);
    transport.connect(port.baud).await?;

    let usb = transport.describe();
    if !usb.is_empty() {
        log::info!("{}: {}", port.port, usb);
    }
    Ok(transport)
}
