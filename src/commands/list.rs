//! List command implementation

use bootlink_core::reset::USB_JTAG_SERIAL_PID;
use bootlink_serial::list_ports as available_ports;

fn format_id(id: Option<u16>) -> String {
    id.map(|v| format!("{:04X}", v)).unwrap_or_else(|| "-".into())
}

/// List serial ports with their USB identity
pub fn list_ports() -> Result<(), Box<dyn std::error::Error>> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    println!("{:<24} {:>6} {:>6}  {}", "Port", "VID", "PID", "Product");
    println!("{}", "-".repeat(60));

    for port in ports {
        let mut product = port.product.clone().unwrap_or_default();
        if port.pid == Some(USB_JTAG_SERIAL_PID) {
            product.push_str(" (USB-JTAG-serial)");
        }
        println!(
            "{:<24} {:>6} {:>6}  {}",
            port.port_name,
            format_id(port.vid),
            format_id(port.pid),
            product.trim()
        );
    }
    Ok(())
}
