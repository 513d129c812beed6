//! bootlink - Talk to a microcontroller ROM bootloader over a serial port
//!
//! The heavy lifting lives in two crates:
//! - `bootlink-core` - SLIP framing and the DTR/RTS reset sequencer
//! - `bootlink-serial` - the buffered, timed serial transport
//!
//! This binary wires them to a command line for resetting boards, checking
//! custom reset sequences, and poking a bootloader with single requests.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{ResetOptions, SendOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = match (cli.verbose, cli.trace) {
        (_, true) | (2.., _) => "trace",
        (1, _) => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // All transport work is cooperative on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let tracing = cli.trace;

    match cli.command {
        Commands::List => commands::list_ports(),
        Commands::CheckSequence { sequence } => commands::check_sequence(&sequence),
        Commands::Reset {
            port,
            strategy,
            reset_delay,
            usb_otg,
            sequence,
        } => {
            let opts = ResetOptions {
                strategy,
                reset_delay_ms: reset_delay,
                usb_otg,
                sequence: sequence.as_deref(),
            };
            commands::run_reset(&port, opts, tracing).await
        }
        Commands::Send {
            port,
            raw,
            timeout,
            min_length,
            payload,
        } => {
            let opts = SendOptions {
                raw,
                timeout_ms: timeout,
                min_length,
            };
            commands::run_send(&port, &payload, opts, tracing).await
        }
        Commands::Monitor {
            port,
            timeout,
            count,
        } => commands::run_monitor(&port, timeout, count, tracing).await,
    }
}
