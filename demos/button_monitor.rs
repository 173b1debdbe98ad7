//! # Button Monitor Example
//!
//! Watches a push button wired to a GPIO line and reports every press
//! through the background interrupt dispatcher. Run on a ConnectCore
//! board with libdigiapix installed:
//!
//! ```text
//! cargo run --example button_monitor -- 18
//! ```

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use digiapix_rs::{ApixLibrary, Gpio, GpioMode, RequestMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let kernel_number: u32 = env::args()
        .nth(1)
        .unwrap_or_else(|| "18".to_string())
        .parse()?;

    let library = ApixLibrary::load()?;
    let button = Gpio::request(
        &library,
        kernel_number,
        GpioMode::IrqEdgeFalling,
        RequestMode::Shared,
    )?;
    button.set_debounce(Duration::from_millis(20))?;

    let presses = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&presses);
    button.register_interrupt_callback(Arc::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("press #{n}");
    }))?;

    println!("watching GPIO {kernel_number}, press the button (Ctrl-C quits)");
    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
