//! List command implementation

use optusb_nusb::{Result, UsbCable};

/// Print every connected bootcable
pub fn list_cables() -> Result<()> {
    let cables = UsbCable::list_devices()?;

    if cables.is_empty() {
        println!("No bootcables connected.");
        return Ok(());
    }

    println!("Connected bootcables:");
    println!();
    for (index, cable) in cables.iter().enumerate() {
        println!("  #{:<3} {}", index, cable);
    }
    Ok(())
}
