//! One sampler per monitored domain. Each `sample` call performs exactly one
//! sampling pass: invoke external tools (with fallback cascades), parse
//! their output into domain records, publish the new sample into the
//! observation store and update that domain's health record. Cadence is the
//! engine's decision, not the sampler's.
//!
//! Samplers never propagate tool or parse failures: a failed pass degrades
//! the domain to an Error health state and leaves the previous sample in
//! place (stale-but-present over nothing).

pub mod ble;
pub mod bluetooth;
pub mod network;
pub mod radio;
pub mod wifi;

use crate::error::Result;

/// A net device counts as wireless when the kernel exposes a `wireless`
/// attribute directory for it under sysfs.
pub fn is_wireless_interface(name: &str) -> bool {
    std::path::Path::new("/sys/class/net")
        .join(name)
        .join("wireless")
        .exists()
}

/// Names of every wireless net device currently registered, in sysfs
/// enumeration order.
pub fn list_wireless_interfaces() -> Result<Vec<String>> {
    let mut interfaces = Vec::new();
    for entry in std::fs::read_dir("/sys/class/net")?.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_wireless_interface(&name) {
            interfaces.push(name);
        }
    }
    Ok(interfaces)
}
