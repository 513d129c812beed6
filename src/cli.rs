//! CLI argument parsing

use bootlink_core::reset::DEFAULT_RESET_DELAY_MS;
use bootlink_serial::{DEFAULT_BAUD_RATE, DEFAULT_MIN_LENGTH};
use clap::{Parser, Subcommand, ValueEnum};

/// Parse a hex string such as `00082400` or `00 08 24 00` into bytes
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if !digits.is_ascii() {
        return Err(format!("Invalid hex string: {:?}", s));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in {:?}", s));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex value: {}", e))
        })
        .collect()
}

#[derive(Parser)]
#[command(name = "bootlink")]
#[command(author, version, about = "ROM bootloader serial transport", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log every byte sent and received (implies -vv)
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Serial port options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct PortArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    pub port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

/// Reset strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// USB-JTAG-serial for PID 0x1001, classic otherwise
    Auto,
    /// DTR/RTS auto-reset circuit
    Classic,
    /// Built-in USB-JTAG-serial peripheral
    UsbJtagSerial,
    /// RTS pulse into the application
    Hard,
    /// Sequence given with --sequence
    Custom,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List serial ports
    List,

    /// Reset the chip through DTR/RTS
    Reset {
        #[command(flatten)]
        port: PortArgs,

        /// Reset strategy
        #[arg(short, long, value_enum, default_value_t = StrategyArg::Auto)]
        strategy: StrategyArg,

        /// EN-low time for the classic strategy, in milliseconds
        #[arg(long, default_value_t = DEFAULT_RESET_DELAY_MS)]
        reset_delay: u32,

        /// Board is connected through the chip's USB-OTG console (hard reset)
        #[arg(long)]
        usb_otg: bool,

        /// Custom sequence, e.g. "D0|R1|W100|D1|R0|W50|D0"
        #[arg(long, required_if_eq("strategy", "custom"))]
        sequence: Option<String>,
    },

    /// Validate a custom reset sequence and print its steps
    CheckSequence {
        /// Sequence text
        sequence: String,
    },

    /// Send one payload and print the response
    Send {
        #[command(flatten)]
        port: PortArgs,

        /// Send and receive without SLIP framing
        #[arg(long)]
        raw: bool,

        /// Response timeout in milliseconds (0 waits forever)
        #[arg(short, long, default_value_t = 3000)]
        timeout: u64,

        /// Minimum number of bytes to wait for
        #[arg(long, default_value_t = DEFAULT_MIN_LENGTH)]
        min_length: usize,

        /// Payload as hex; several words are concatenated
        #[arg(required = true)]
        payload: Vec<String>,
    },

    /// Print raw bytes received on the port
    Monitor {
        #[command(flatten)]
        port: PortArgs,

        /// Per-read timeout in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        timeout: u64,

        /// Stop after this many reads (0 runs until the port closes)
        #[arg(short, long, default_value_t = 0)]
        count: usize,
    },
}
