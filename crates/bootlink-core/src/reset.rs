//! Reset sequencing over DTR/RTS
//!
//! Most development boards wire DTR and RTS to the chip's EN and boot-strap
//! pins, so a timed pattern on those two lines resets the chip into its ROM
//! bootloader. A pattern is a list of [`ResetCommand`]s executed strictly in
//! order against a [`ResetTarget`]; each step, including its delay, finishes
//! before the next one starts.
//!
//! Besides the built-in programs, a pattern can be given as text:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `D0` / `D1` | set DTR low / high |
//! | `R0` / `R1` | set RTS low / high |
//! | `W<ms>` | wait `ms` milliseconds (positive integer) |
//!
//! Tokens are joined with `|`; `"D0|R1|W100|D1|R0|W50|D0"` is the classic
//! reset.

use core::fmt;

use crate::error::{CustomSequenceError, ResetError, SequenceError};

/// Default EN-low time for the classic reset
pub const DEFAULT_RESET_DELAY_MS: u32 = 50;

/// USB product ID of the built-in USB-JTAG-serial peripheral
pub const USB_JTAG_SERIAL_PID: u16 = 0x1001;

/// Capacity of a built-in reset program
pub const MAX_PROGRAM_LEN: usize = 16;

/// A built-in reset program
pub type Program = heapless::Vec<ResetCommand, MAX_PROGRAM_LEN>;

/// Something whose control lines can be driven by a reset program
///
/// Implemented by the serial transport; tests implement it with a recorder.
pub trait ResetTarget {
    /// Error reported by the line setters
    type Error;

    /// Drive the DTR line
    async fn set_dtr(&mut self, level: bool) -> Result<(), Self::Error>;

    /// Drive the RTS line
    async fn set_rts(&mut self, level: bool) -> Result<(), Self::Error>;

    /// Wait for `ms` milliseconds
    async fn sleep(&mut self, ms: u32);
}

/// A single reset step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCommand {
    /// Set DTR to the given level
    SetDtr(bool),
    /// Set RTS to the given level
    SetRts(bool),
    /// Wait for the given number of milliseconds
    Wait(u32),
}

impl ResetCommand {
    /// Run this step against `target`
    pub async fn apply<T: ResetTarget>(self, target: &mut T) -> Result<(), T::Error> {
        match self {
            ResetCommand::SetDtr(level) => target.set_dtr(level).await,
            ResetCommand::SetRts(level) => target.set_rts(level).await,
            ResetCommand::Wait(ms) => {
                target.sleep(ms).await;
                Ok(())
            }
        }
    }
}

impl fmt::Display for ResetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetCommand::SetDtr(level) => write!(f, "D{}", u8::from(*level)),
            ResetCommand::SetRts(level) => write!(f, "R{}", u8::from(*level)),
            ResetCommand::Wait(ms) => write!(f, "W{}", ms),
        }
    }
}

/// Displays a program in the custom sequence grammar
pub struct Sequence<'a>(pub &'a [ResetCommand]);

impl fmt::Display for Sequence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cmd) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

fn program(steps: &[ResetCommand]) -> Program {
    steps.iter().copied().collect()
}

/// Classic reset for boards with the two-transistor auto-reset circuit
pub fn classic_program(reset_delay_ms: u32) -> Program {
    use ResetCommand::*;
    program(&[
        SetDtr(false),
        SetRts(true),
        Wait(100),
        SetDtr(true),
        SetRts(false),
        Wait(reset_delay_ms),
        SetDtr(false),
    ])
}

/// Reset for chips connected through their USB-JTAG-serial peripheral
pub fn usb_jtag_serial_program() -> Program {
    use ResetCommand::*;
    program(&[
        SetRts(false),
        SetDtr(false),
        Wait(100),
        SetDtr(true),
        SetRts(false),
        Wait(100),
        SetRts(true),
        SetDtr(false),
        // Repeated so the RTS level is sent together with DTR=0
        SetRts(true),
        Wait(100),
        SetRts(false),
        SetDtr(false),
    ])
}

/// Hard reset into the application
///
/// A USB-OTG console needs longer settling before and after the pulse.
pub fn hard_program(usb_otg: bool) -> Program {
    use ResetCommand::*;
    if usb_otg {
        program(&[Wait(200), SetRts(false), Wait(200)])
    } else {
        program(&[Wait(100), SetRts(false)])
    }
}

/// Run `steps` in order, stopping at the first failure
pub async fn run_program<T: ResetTarget>(
    target: &mut T,
    steps: &[ResetCommand],
) -> Result<(), T::Error> {
    for (i, step) in steps.iter().enumerate() {
        log::debug!("reset: step {} {}", i, step);
        step.apply(target).await?;
    }
    Ok(())
}

/// Parse one custom sequence token such as `D1` or `W100`
pub fn parse_command(token: &str) -> Result<ResetCommand, SequenceError> {
    let mut chars = token.chars();
    let code = chars.next().ok_or(SequenceError::MissingCode)?;
    let arg = chars.as_str();

    match code {
        'D' | 'R' => {
            let level = match arg {
                "0" => false,
                "1" => true,
                _ => return Err(SequenceError::InvalidLevel(code)),
            };
            Ok(if code == 'D' {
                ResetCommand::SetDtr(level)
            } else {
                ResetCommand::SetRts(level)
            })
        }
        'W' => match arg.parse::<u32>() {
            Ok(ms) if ms > 0 => Ok(ResetCommand::Wait(ms)),
            _ => Err(SequenceError::InvalidDelay),
        },
        other => Err(SequenceError::UnknownCode(other)),
    }
}

/// Parse every `|`-separated token of `text`
pub fn parse_sequence(
    text: &str,
) -> impl Iterator<Item = Result<ResetCommand, SequenceError>> + '_ {
    text.split('|').map(parse_command)
}

/// Whether every token of `text` is a valid command
pub fn validate_custom_sequence(text: &str) -> bool {
    parse_sequence(text).all(|cmd| cmd.is_ok())
}

/// Run a custom sequence given as text
///
/// Invalid text is ignored: nothing runs and `Ok(())` is returned. Callers
/// that need to report bad input should check [`validate_custom_sequence`]
/// first.
pub async fn custom_reset<T: ResetTarget>(
    target: &mut T,
    text: &str,
) -> Result<(), CustomSequenceError<T::Error>> {
    if !validate_custom_sequence(text) {
        log::debug!("reset: ignoring invalid custom sequence {:?}", text);
        return Ok(());
    }

    for (step, cmd) in parse_sequence(text).flatten().enumerate() {
        log::debug!("reset: custom step {} {}", step, cmd);
        cmd.apply(target)
            .await
            .map_err(|source| CustomSequenceError { step, source })?;
    }
    Ok(())
}

/// How to reset the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStrategy<'a> {
    /// DTR/RTS auto-reset circuit
    Classic {
        /// How long EN is held low, in milliseconds
        reset_delay_ms: u32,
    },
    /// USB-JTAG-serial peripheral
    UsbJtagSerial,
    /// Hard reset (RTS pulse only)
    Hard {
        /// Connected through the chip's USB-OTG console
        usb_otg: bool,
    },
    /// Custom sequence text
    Custom(&'a str),
}

impl Default for ResetStrategy<'_> {
    fn default() -> Self {
        ResetStrategy::Classic {
            reset_delay_ms: DEFAULT_RESET_DELAY_MS,
        }
    }
}

impl ResetStrategy<'_> {
    /// Pick the bootloader-entry strategy for a USB product ID
    pub fn for_pid(pid: Option<u16>) -> Self {
        match pid {
            Some(USB_JTAG_SERIAL_PID) => ResetStrategy::UsbJtagSerial,
            _ => ResetStrategy::default(),
        }
    }

    /// The fixed program for this strategy (`None` for custom text)
    pub fn program(&self) -> Option<Program> {
        match *self {
            ResetStrategy::Classic { reset_delay_ms } => Some(classic_program(reset_delay_ms)),
            ResetStrategy::UsbJtagSerial => Some(usb_jtag_serial_program()),
            ResetStrategy::Hard { usb_otg } => Some(hard_program(usb_otg)),
            ResetStrategy::Custom(_) => None,
        }
    }

    /// Run the strategy against `target`
    pub async fn execute<T: ResetTarget>(&self, target: &mut T) -> Result<(), ResetError<T::Error>> {
        match self {
            ResetStrategy::Custom(text) => Ok(custom_reset(target, text).await?),
            fixed => {
                let steps = fixed.program().unwrap_or_default();
                run_program(target, &steps).await.map_err(ResetError::Target)
            }
        }
    }
}
