//! Reset command implementation

use bootlink_core::reset::{ResetStrategy, Sequence};

use super::open_transport;
use super::sequence::parse_or_explain;
use crate::cli::{PortArgs, StrategyArg};

/// Options for the reset command
pub struct ResetOptions<'a> {
    pub strategy: StrategyArg,
    pub reset_delay_ms: u32,
    pub usb_otg: bool,
    pub sequence: Option<&'a str>,
}

fn select_strategy<'a>(opts: &ResetOptions<'a>, pid: Option<u16>) -> ResetStrategy<'a> {
    match opts.strategy {
        StrategyArg::Auto => match ResetStrategy::for_pid(pid) {
            ResetStrategy::Classic { .. } => ResetStrategy::Classic {
                reset_delay_ms: opts.reset_delay_ms,
            },
            other => other,
        },
        StrategyArg::Classic => ResetStrategy::Classic {
            reset_delay_ms: opts.reset_delay_ms,
        },
        StrategyArg::UsbJtagSerial => ResetStrategy::UsbJtagSerial,
        StrategyArg::Hard => ResetStrategy::Hard {
            usb_otg: opts.usb_otg,
        },
        StrategyArg::Custom => ResetStrategy::Custom(opts.sequence.unwrap_or_default()),
    }
}

/// Reset the chip on `port`
pub async fn run_reset(
    port: &PortArgs,
    opts: ResetOptions<'_>,
    tracing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // The sequencer ignores bad text; refuse it here instead
    if opts.strategy == StrategyArg::Custom {
        parse_or_explain(opts.sequence.unwrap_or_default())?;
    }

    let mut transport = open_transport(port, false, tracing).await?;
    let strategy = select_strategy(&opts, transport.pid());

    match strategy.program() {
        Some(program) => log::info!("Resetting with {:?} ({})", strategy, Sequence(&program)),
        None => log::info!("Resetting with {:?}", strategy),
    }

    let result = transport.reset(strategy).await;
    transport.disconnect().await?;
    result?;

    println!("Reset complete");
    Ok(())
}
