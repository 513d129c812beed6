//! Custom sequence checking

use bootlink_core::reset::{parse_sequence, ResetCommand, Sequence};

/// Parse `text`, reporting the first bad token
pub(crate) fn parse_or_explain(text: &str) -> Result<Vec<ResetCommand>, String> {
    parse_sequence(text)
        .enumerate()
        .map(|(i, cmd)| {
            cmd.map_err(|e| {
                let token = text.split('|').nth(i).unwrap_or_default();
                format!("Invalid reset sequence: token {} ({:?}): {}", i + 1, token, e)
            })
        })
        .collect()
}

/// Validate a custom sequence and print what it would do
pub fn check_sequence(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let steps = parse_or_explain(text)?;

    println!("Sequence: {}", Sequence(&steps));
    for (i, step) in steps.iter().enumerate() {
        let action = match step {
            ResetCommand::SetDtr(level) => format!("DTR = {}", u8::from(*level)),
            ResetCommand::SetRts(level) => format!("RTS = {}", u8::from(*level)),
            ResetCommand::Wait(ms) => format!("wait {} ms", ms),
        };
        println!("  {:>2}: {}", i + 1, action);
    }
    let total: u64 = steps
        .iter()
        .map(|s| match s {
            ResetCommand::Wait(ms) => u64::from(*ms),
            _ => 0,
        })
        .sum();
    println!("Total delay: {} ms", total);
    Ok(())
}
