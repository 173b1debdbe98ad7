//! # Network Info Example
//!
//! Dumps the state and counters of every wired and wireless interface
//! the native layer can see. Run on a ConnectCore board with
//! libdigiapix installed:
//!
//! ```text
//! cargo run --example network_info
//! ```

use digiapix_rs::{ApixLibrary, NetworkInterface, WifiInterface};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let library = ApixLibrary::load()?;

    for name in NetworkInterface::list(&library) {
        let iface = NetworkInterface::get(library.backend(), &name)?;
        println!("{name}: {:?} mac {}", iface.status(), iface.mac());
        println!("  ipv4 {} / {}", iface.ipv4(), iface.netmask());
        println!("  gateway {} mtu {}", iface.gateway(), iface.mtu());
        let stats = iface.statistics()?;
        println!(
            "  rx {} packets ({} bytes), tx {} packets ({} bytes)",
            stats.rx_packets, stats.rx_bytes, stats.tx_packets, stats.tx_bytes
        );
    }

    for name in WifiInterface::list(&library) {
        let wifi = WifiInterface::get(library.backend(), &name)?;
        println!(
            "{name}: ssid '{}' channel {} ({:.3} GHz) security {:?}",
            wifi.ssid(),
            wifi.channel(),
            wifi.frequency() / 1_000_000_000.0,
            wifi.security(),
        );
    }

    Ok(())
}
