//! bootlink-serial - Serial transport for ROM bootloaders
//!
//! This crate moves bytes between a host and a chip's ROM bootloader over a
//! serial port. It buffers partial reads, applies SLIP framing on demand,
//! enforces read deadlines without losing data, and drives the DTR/RTS lines
//! used to reset the chip into download mode.
//!
//! # Example
//!
//! ```no_run
//! use bootlink_core::reset::ResetStrategy;
//! use bootlink_serial::{SerialPortDevice, Transport, DEFAULT_BAUD_RATE};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut transport = Transport::new(SerialPortDevice::new("/dev/ttyUSB0"));
//! transport.connect(DEFAULT_BAUD_RATE).await?;
//! transport.reset(ResetStrategy::default()).await?;
//!
//! transport.set_slip(true);
//! transport.write(&[0x00, 0x08, 0x24, 0x00]).await?;
//! let reply = transport.read(3000, 12).await?;
//! println!("{} byte reply", reply.len());
//!
//! transport.disconnect().await?;
//! # Ok(())
//! # }
//! ```

// Device futures are not required to be Send
#![allow(async_fn_in_trait)]

pub mod device;
pub mod error;
pub mod reset;
pub mod trace;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-exports
pub use device::{list_ports, ControlLine, PortInfo, SerialDevice, SerialPortDevice};
pub use error::{Result, TransportError};
pub use transport::{
    ChannelLock, ChannelState, Transport, TransportConfig, DEFAULT_BAUD_RATE, DEFAULT_MIN_LENGTH,
};
