//! # digiapix-rs - Rust Bindings for the Digi APIX Library
//!
//! The digiapix-rs crate binds the native `libdigiapix` hardware-abstraction
//! library of Digi International's ConnectCore platforms. It covers four
//! hardware domains: GPIO digital I/O with interrupt dispatch, wired
//! network interfaces, WiFi interfaces, and Bluetooth adapters.
//!
//! ## Features
//!
//! - Explicit runtime loading of `libdigiapix` behind an injectable backend
//! - GPIO requests by kernel number, controller line, or device-tree alias
//! - Blocking interrupt waits plus background listener dispatch per line
//! - Network, WiFi, and Bluetooth state, statistics, and configuration
//! - Profile-based configuration where unset fields keep their value
//! - An in-memory mock backend for tests without hardware
//!
//! ## Usage
//!
//! To use the digiapix-rs crate in your Rust project, add the following to
//! your Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! digiapix-rs = "0.4"
//! ```
//!
//! Then, in your Rust code, you can import the necessary modules and
//! functions:
//!
//! ```rust
//! use digiapix_rs::{
//!     ApixLibrary, Gpio, GpioMode, RequestMode, WaitResult,
//!     NetworkInterface, NetworkProfile, init_logger,
//! };
//! ```
//!
//! Requesting a line and waiting for an edge:
//!
//! ```no_run
//! use std::time::Duration;
//! use digiapix_rs::{ApixLibrary, Gpio, GpioMode, RequestMode, WaitResult};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = ApixLibrary::load()?;
//! let button = Gpio::request(
//!     &library,
//!     18,
//!     GpioMode::IrqEdgeRising,
//!     RequestMode::Shared,
//! )?;
//! match button.wait_for_interrupt(Some(Duration::from_secs(5)))? {
//!     WaitResult::Interrupt => println!("pressed"),
//!     WaitResult::Timeout => println!("nothing happened"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bluetooth;
pub mod common;
pub mod error;
pub mod ffi;
pub mod gpio;
pub mod library;
pub mod logging;
pub mod mock;
pub mod network;
pub mod wifi;

pub use crate::error::{
    BluetoothError, GpioError, LibraryError, NetworkError, WifiError,
};
pub use crate::logging::{init_logger, init_logger_with_level};

// Library loading and the backend seam
pub use backend::{ApixBackend, GpioLine};
pub use library::ApixLibrary;
pub use mock::MockApix;

// GPIO handles
pub use gpio::{
    Gpio, GpioActiveMode, GpioMode, GpioValue, InterruptCallback,
    RequestMode, WaitResult,
};

// Network, WiFi and Bluetooth handles
pub use bluetooth::{BluetoothDevice, BluetoothProfile, BluetoothStats};
pub use common::MacAddress;
pub use network::{
    IpMode, NetStatus, NetworkInterface, NetworkProfile, NetworkStats,
};
pub use wifi::{SecurityMode, WifiInterface, WifiProfile};
