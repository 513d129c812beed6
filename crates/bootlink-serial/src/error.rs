//! Error types for transport operations

use std::io;

use thiserror::Error;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Device could not be opened at the requested rate
    #[error("Failed to open device at {baud} baud: {source}")]
    DeviceOpen {
        baud: u32,
        #[source]
        source: io::Error,
    },

    /// Read did not complete before its deadline
    ///
    /// Bytes received before the deadline stay buffered for the next read.
    #[error("Read timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Device stopped delivering data
    #[error("Device read channel closed")]
    Closed,

    /// I/O error during communication
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for transport operations
pub type Result<T> = core::result::Result<T, TransportError>;
