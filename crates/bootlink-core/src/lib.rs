//! bootlink-core - Framing and reset sequencing for ROM bootloaders
//!
//! This crate holds the pieces of the bootloader transport that do not touch
//! a serial port: the SLIP codec used to frame bootloader packets, and the
//! reset sequencer that toggles DTR/RTS in timed patterns to bring a chip
//! into download mode. It is `no_std` compatible; the SLIP codec needs
//! `alloc`.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation (required by the SLIP codec)
//!
//! # Example
//!
//! ```ignore
//! use bootlink_core::reset::{ResetStrategy, ResetTarget};
//!
//! async fn enter_bootloader<T: ResetTarget>(port: &mut T) -> Result<(), T::Error> {
//!     ResetStrategy::Classic { reset_delay_ms: 50 }.execute(port).await
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Reset targets are async; callers decide on Send bounds
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod reset;
#[cfg(feature = "alloc")]
pub mod slip;

pub use error::{CustomSequenceError, ResetError, SequenceError};
pub use reset::{ResetCommand, ResetStrategy, ResetTarget};
