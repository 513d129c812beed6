//! Error types for bootlink-core
//!
//! These are `no_std` compatible; `std::error::Error` is implemented when the
//! `std` feature is enabled.

use core::fmt;

/// Why a custom reset sequence token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    /// Token is empty (e.g. `"D0||R1"` or an empty string)
    MissingCode,
    /// First character is not one of `D`, `R`, `W`
    UnknownCode(char),
    /// `D`/`R` argument is not exactly `0` or `1`
    InvalidLevel(char),
    /// `W` argument is not a positive base-10 integer
    InvalidDelay,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCode => write!(f, "empty command"),
            Self::UnknownCode(code) => {
                write!(f, "unknown command code '{}' (expected D, R or W)", code)
            }
            Self::InvalidLevel(code) => write!(f, "{} expects 0 or 1", code),
            Self::InvalidDelay => write!(f, "W expects a positive number of milliseconds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SequenceError {}

/// A validated custom reset sequence failed while running
///
/// Keeps the index of the failing step and the target's error.
#[derive(Debug)]
pub struct CustomSequenceError<E> {
    /// Zero-based index of the step that failed
    pub step: usize,
    /// Error reported by the reset target
    pub source: E,
}

impl<E> fmt::Display for CustomSequenceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid custom reset sequence (step {} failed)", self.step)
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for CustomSequenceError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Error from running a [`ResetStrategy`](crate::reset::ResetStrategy)
#[derive(Debug)]
pub enum ResetError<E> {
    /// A built-in program step failed
    Target(E),
    /// A custom sequence step failed
    CustomSequence(CustomSequenceError<E>),
}

impl<E> From<CustomSequenceError<E>> for ResetError<E> {
    fn from(e: CustomSequenceError<E>) -> Self {
        ResetError::CustomSequence(e)
    }
}

impl<E: fmt::Display> fmt::Display for ResetError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(e) => write!(f, "reset failed: {}", e),
            Self::CustomSequence(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for ResetError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Target(e) => Some(e),
            Self::CustomSequence(e) => Some(e),
        }
    }
}
