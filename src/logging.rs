//! Logger initialization helpers.

use log::LevelFilter;

/// Initializes the logger with the `env_logger` crate, honoring
/// `RUST_LOG`.
///
/// Safe to call more than once; later calls keep the first configuration.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// Initializes the logger at a fixed level, ignoring `RUST_LOG`.
pub fn init_logger_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new().filter_level(level).try_init();
}
